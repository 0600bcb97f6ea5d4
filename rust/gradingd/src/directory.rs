//! Read-only lookups into the collaborator tables: semester registry,
//! student directory, course catalog and class/enrollment directory.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: String,
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassContext {
    pub class_id: String,
    pub name: String,
    pub course_id: String,
    pub semester: String,
    pub year: i64,
    pub department_id: Option<String>,
}

/// Registry spelling of an active semester, matched case-insensitively.
pub fn canonical_semester(conn: &Connection, name: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM semesters WHERE active = 1 AND name = ? COLLATE NOCASE",
        [name.trim()],
        |r| r.get(0),
    )
    .optional()
}

/// Sort rank per semester name, keyed lowercase.
pub fn semester_ranks(conn: &Connection) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT name, sort_order FROM semesters")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .map(|(name, rank)| (name.to_ascii_lowercase(), rank))
        .collect())
}

pub fn student_exists(conn: &Connection, student_id: &str) -> rusqlite::Result<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(hit.is_some())
}

/// Resolves the human-readable identifier printed on rosters.
pub fn find_student_by_code(conn: &Connection, code: &str) -> rusqlite::Result<Option<StudentRef>> {
    conn.query_row(
        "SELECT id, student_code, first_name, last_name
         FROM students
         WHERE student_code = ? COLLATE NOCASE",
        [code.trim()],
        student_from_row,
    )
    .optional()
}

pub fn course_credit_hours(conn: &Connection, course_id: &str) -> rusqlite::Result<Option<f64>> {
    conn.query_row(
        "SELECT credit_hours FROM courses WHERE id = ?",
        [course_id],
        |r| r.get(0),
    )
    .optional()
}

pub fn class_context(conn: &Connection, class_id: &str) -> rusqlite::Result<Option<ClassContext>> {
    conn.query_row(
        "SELECT cl.id, cl.name, cl.course_id, cl.semester, cl.year,
                COALESCE(cl.department_id, co.department_id)
         FROM classes cl
         LEFT JOIN courses co ON co.id = cl.course_id
         WHERE cl.id = ?",
        [class_id],
        |r| {
            Ok(ClassContext {
                class_id: r.get(0)?,
                name: r.get(1)?,
                course_id: r.get(2)?,
                semester: r.get(3)?,
                year: r.get(4)?,
                department_id: r.get(5)?,
            })
        },
    )
    .optional()
}

/// Students with at least one attendance entry for the class.
pub fn attendance_roster(conn: &Connection, class_id: &str) -> rusqlite::Result<Vec<StudentRef>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT s.id, s.student_code, s.first_name, s.last_name
         FROM attendance a
         JOIN students s ON s.id = a.student_id
         WHERE a.class_id = ?
         ORDER BY s.student_code",
    )?;
    let rows = stmt
        .query_map([class_id], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Admitted students of a department, optionally narrowed to a faculty.
pub fn admitted_students(
    conn: &Connection,
    department_id: &str,
    faculty_id: Option<&str>,
) -> rusqlite::Result<Vec<StudentRef>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.student_code, s.first_name, s.last_name
         FROM students s
         LEFT JOIN departments d ON d.id = s.department_id
         WHERE s.status = 'admitted'
           AND s.department_id = ?1
           AND (?2 IS NULL OR d.faculty_id = ?2)
         ORDER BY s.student_code",
    )?;
    let rows = stmt
        .query_map((department_id, faculty_id), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRef> {
    Ok(StudentRef {
        id: r.get(0)?,
        student_code: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
    })
}
