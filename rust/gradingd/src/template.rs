use crate::directory::{self, StudentRef};
use crate::error::GradingError;
use crate::marks::MarkComponent;
use crate::sheet::{write_sheet, Sheet, SheetFormat};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterSource {
    Attendance,
    Department,
}

#[derive(Debug, Clone, Default)]
pub struct RosterFilter<'a> {
    pub department_id: Option<&'a str>,
    pub faculty_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub bytes: Vec<u8>,
    pub format: SheetFormat,
    pub roster_source: RosterSource,
    pub student_count: usize,
}

pub fn template_header() -> Vec<String> {
    let mut header = vec![
        "Student ID".to_string(),
        "First Name".to_string(),
        "Last Name".to_string(),
    ];
    header.extend(MarkComponent::ALL.iter().map(|c| c.header()));
    header
}

/// Students who attended the class; failing that, admitted students of the
/// class department (or the override department), optionally narrowed to a
/// faculty.
pub fn class_roster(
    conn: &Connection,
    class_id: &str,
    filter: &RosterFilter<'_>,
) -> Result<(Vec<StudentRef>, RosterSource), GradingError> {
    let Some(class) = directory::class_context(conn, class_id)? else {
        return Err(GradingError::not_found("class", class_id));
    };

    let attended = directory::attendance_roster(conn, class_id)?;
    if !attended.is_empty() {
        return Ok((attended, RosterSource::Attendance));
    }

    let Some(department) = filter.department_id.or(class.department_id.as_deref()) else {
        tracing::warn!(class_id, "class and course have no department; roster is empty");
        return Ok((Vec::new(), RosterSource::Department));
    };
    let admitted = directory::admitted_students(conn, department, filter.faculty_id)?;
    Ok((admitted, RosterSource::Department))
}

pub fn generate_template(
    conn: &Connection,
    class_id: &str,
    filter: &RosterFilter<'_>,
    format: SheetFormat,
) -> Result<Template, GradingError> {
    let (roster, roster_source) = class_roster(conn, class_id, filter)?;

    let mut rows = vec![template_header()];
    for s in &roster {
        let mut row = vec![
            s.student_code.clone(),
            s.first_name.clone(),
            s.last_name.clone(),
        ];
        row.extend(MarkComponent::ALL.iter().map(|_| String::new()));
        rows.push(row);
    }

    let bytes = write_sheet(&Sheet { rows }, format)
        .map_err(|e| GradingError::Structural(format!("failed to build template: {e:#}")))?;
    tracing::info!(
        class_id,
        ?roster_source,
        students = roster.len(),
        format = format.as_str(),
        "template generated"
    );

    Ok(Template {
        bytes,
        format,
        roster_source,
        student_count: roster.len(),
    })
}
