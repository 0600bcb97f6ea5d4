use crate::gpa::compute_gpa;
use crate::ipc::error::{err, err_from, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_gpa_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => return err(&req.id, "bad_params", "missing studentId", None),
    };
    match compute_gpa(conn, student_id) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => err_from(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gpa.compute" => Some(handle_gpa_compute(state, req)),
        _ => None,
    }
}
