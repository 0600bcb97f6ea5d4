use crate::config;
use crate::error::GradingError;
use crate::ipc::error::{err, err_from, ok};
use crate::ipc::types::{AppState, Request};
use crate::marks::{validate_marks, MarkSet, PartialMarkSet};
use crate::records::{self, ConflictPolicy, RecordKey};
use serde_json::json;

fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

fn marks_param(req: &Request) -> Result<MarkSet, serde_json::Value> {
    let raw = req.params.get("marks").cloned().unwrap_or(json!({}));
    if !raw.is_object() {
        return Err(err(&req.id, "bad_params", "marks must be an object", None));
    }
    validate_marks(&PartialMarkSet::from_json(&raw))
        .map_err(|v| err_from(&req.id, &GradingError::Validation(v)))
}

fn record_key(req: &Request) -> Result<RecordKey, serde_json::Value> {
    let student_id = required_str(req, "studentId")?;
    let course_id = required_str(req, "courseId")?;
    let semester = required_str(req, "semester")?;
    let Some(year) = req.params.get("year").and_then(|v| v.as_i64()) else {
        return Err(err(&req.id, "bad_params", "year must be an integer", None));
    };
    Ok(RecordKey {
        student_id: student_id.to_string(),
        course_id: course_id.to_string(),
        semester: semester.to_string(),
        year,
    })
}

fn handle_records_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let key = match record_key(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let policy = match req.params.get("onConflict").and_then(|v| v.as_str()) {
        Some(raw) => match ConflictPolicy::parse(raw) {
            Some(p) => p,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "onConflict must be one of: reject, overwrite",
                    None,
                )
            }
        },
        None => match config::grading_config(conn) {
            Ok(c) => c.manual_conflict_policy,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
    };

    let marks = match marks_param(req) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match records::upsert_record(conn, &key, &marks, policy) {
        Ok((record, outcome)) => ok(&req.id, json!({ "record": record, "outcome": outcome })),
        Err(e) => err_from(&req.id, &e),
    }
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let record_id = match required_str(req, "recordId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let marks = match marks_param(req) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    match records::update_record(conn, record_id, &marks) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => err_from(&req.id, &e),
    }
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match records::list_student_records(conn, student_id) {
        Ok(list) => ok(&req.id, json!({ "records": list })),
        Err(e) => err_from(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.create" => Some(handle_records_create(state, req)),
        "records.update" => Some(handle_records_update(state, req)),
        "records.list" => Some(handle_records_list(state, req)),
        _ => None,
    }
}
