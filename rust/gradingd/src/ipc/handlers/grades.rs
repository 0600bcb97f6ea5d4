use crate::error::GradingError;
use crate::ipc::error::{err, err_from, ok};
use crate::ipc::types::{AppState, Request};
use crate::marks::{validate_marks, PartialMarkSet};
use crate::scale::resolve_grade;
use serde_json::json;

fn handle_grades_resolve(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(total) = req.params.get("total").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "total must be a number", None);
    };
    let resolved = resolve_grade(total);
    ok(
        &req.id,
        json!({ "grade": resolved.grade, "gradePoints": resolved.grade_points }),
    )
}

/// Dry run of the single-record path: no workspace needed, nothing stored.
fn handle_marks_validate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = match req.params.get("marks") {
        Some(v) if v.is_object() => v,
        _ => return err(&req.id, "bad_params", "marks must be an object", None),
    };
    match validate_marks(&PartialMarkSet::from_json(raw)) {
        Ok(marks) => {
            let total = marks.total();
            let resolved = marks.grade();
            ok(
                &req.id,
                json!({
                    "marks": marks,
                    "totalMarks": total,
                    "grade": resolved.grade,
                    "gradePoints": resolved.grade_points,
                }),
            )
        }
        Err(violations) => err_from(&req.id, &GradingError::Validation(violations)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.resolve" => Some(handle_grades_resolve(state, req)),
        "marks.validate" => Some(handle_marks_validate(state, req)),
        _ => None,
    }
}
