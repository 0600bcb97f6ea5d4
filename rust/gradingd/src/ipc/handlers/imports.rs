use crate::config;
use crate::import::import_class_marks;
use crate::ipc::error::{err, err_from, ok};
use crate::ipc::types::{AppState, Request};
use crate::sheet::SheetFormat;
use crate::template::{generate_template, RosterFilter};
use serde_json::json;
use std::path::PathBuf;

fn trimmed_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn handle_marks_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(class_id) = trimmed_param(req, "classId") else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let Some(in_path) = trimmed_param(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };

    let bytes = match std::fs::read(in_path) {
        Ok(b) => b,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": in_path })),
            )
        }
    };

    match import_class_marks(conn, class_id, &bytes) {
        Ok(batch) => ok(&req.id, json!(batch)),
        Err(e) => err_from(&req.id, &e),
    }
}

fn handle_marks_template(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(class_id) = trimmed_param(req, "classId") else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let Some(out_path) = trimmed_param(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    let format = match trimmed_param(req, "format") {
        Some(raw) => match SheetFormat::parse(raw) {
            Some(f) => f,
            None => return err(&req.id, "bad_params", "format must be xlsx or csv", None),
        },
        None => match config::grading_config(conn) {
            Ok(c) => c.default_template_format,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
    };
    let filter = RosterFilter {
        department_id: trimmed_param(req, "departmentId"),
        faculty_id: trimmed_param(req, "facultyId"),
    };

    let template = match generate_template(conn, class_id, &filter, format) {
        Ok(t) => t,
        Err(e) => return err_from(&req.id, &e),
    };

    let out = PathBuf::from(out_path);
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            );
        }
    }
    if let Err(e) = std::fs::write(&out, &template.bytes) {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }

    ok(
        &req.id,
        json!({
            "path": out_path,
            "format": template.format.as_str(),
            "rosterSource": template.roster_source,
            "studentCount": template.student_count,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.import" => Some(handle_marks_import(state, req)),
        "marks.template" => Some(handle_marks_template(state, req)),
        _ => None,
    }
}
