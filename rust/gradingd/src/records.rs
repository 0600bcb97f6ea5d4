use crate::directory;
use crate::error::GradingError;
use crate::marks::MarkSet;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Natural key: at most one record per student per course per term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub student_id: String,
    pub course_id: String,
    pub semester: String,
    pub year: i64,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "student {}, course {}, {} {}",
            self.student_id, self.course_id, self.semester, self.year
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    Reject,
    Overwrite,
}

impl ConflictPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "overwrite" => Some(Self::Overwrite),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Overwrite => "overwrite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub semester: String,
    pub year: i64,
    pub marks: MarkSet,
    pub total_marks: f64,
    pub grade: String,
    pub grade_points: f64,
    pub credit_hours: f64,
    pub created_at: String,
    pub updated_at: String,
}

const RECORD_COLUMNS: &str = "r.id, r.student_id, r.course_id, r.semester, r.year,
    r.mid_exam, r.final_exam, r.assessment, r.project, r.assignment, r.presentation,
    r.total_marks, r.grade, r.grade_points, COALESCE(c.credit_hours, 0),
    r.created_at, r.updated_at";

fn record_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ExamRecord> {
    Ok(ExamRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        course_id: r.get(2)?,
        semester: r.get(3)?,
        year: r.get(4)?,
        marks: MarkSet {
            mid_exam: r.get(5)?,
            final_exam: r.get(6)?,
            assessment: r.get(7)?,
            project: r.get(8)?,
            assignment: r.get(9)?,
            presentation: r.get(10)?,
        },
        total_marks: r.get(11)?,
        grade: r.get(12)?,
        grade_points: r.get(13)?,
        credit_hours: r.get(14)?,
        created_at: r.get(15)?,
        updated_at: r.get(16)?,
    })
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Single entry point for writing exam records. The term is checked
/// against the semester registry and both references are resolved before
/// anything is computed; the write itself is one conditional insert on the
/// natural key, so concurrent callers cannot double-create.
pub fn upsert_record(
    conn: &Connection,
    key: &RecordKey,
    marks: &MarkSet,
    policy: ConflictPolicy,
) -> Result<(ExamRecord, UpsertOutcome), GradingError> {
    let Some(semester) = directory::canonical_semester(conn, &key.semester)? else {
        return Err(GradingError::UnknownSemester(key.semester.clone()));
    };
    if !directory::student_exists(conn, &key.student_id)? {
        return Err(GradingError::not_found("student", &key.student_id));
    }
    let Some(credit_hours) = directory::course_credit_hours(conn, &key.course_id)? else {
        return Err(GradingError::not_found("course", &key.course_id));
    };

    let key = RecordKey {
        semester,
        ..key.clone()
    };
    let total = marks.total();
    let resolved = marks.grade();
    let proposed_id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    let conflict_clause = match policy {
        ConflictPolicy::Overwrite => {
            "ON CONFLICT(student_id, course_id, semester, year) DO UPDATE SET
               mid_exam = excluded.mid_exam,
               final_exam = excluded.final_exam,
               assessment = excluded.assessment,
               project = excluded.project,
               assignment = excluded.assignment,
               presentation = excluded.presentation,
               total_marks = excluded.total_marks,
               grade = excluded.grade,
               grade_points = excluded.grade_points,
               updated_at = excluded.updated_at"
        }
        ConflictPolicy::Reject => "ON CONFLICT(student_id, course_id, semester, year) DO NOTHING",
    };
    let sql = format!(
        "INSERT INTO exam_records(
            id, student_id, course_id, semester, year,
            mid_exam, final_exam, assessment, project, assignment, presentation,
            total_marks, grade, grade_points, created_at, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
         {conflict_clause}
         RETURNING id, created_at"
    );

    let written: Option<(String, String)> = conn
        .query_row(
            &sql,
            rusqlite::params![
                proposed_id,
                key.student_id,
                key.course_id,
                key.semester,
                key.year,
                marks.mid_exam,
                marks.final_exam,
                marks.assessment,
                marks.project,
                marks.assignment,
                marks.presentation,
                total,
                resolved.grade,
                resolved.grade_points,
                now,
            ],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let Some((id, created_at)) = written else {
        return Err(GradingError::Conflict(key));
    };
    let outcome = if id == proposed_id {
        UpsertOutcome::Created
    } else {
        UpsertOutcome::Updated
    };
    tracing::debug!(record_id = %id, %key, ?outcome, total, grade = resolved.grade, "exam record written");

    Ok((
        ExamRecord {
            id,
            student_id: key.student_id,
            course_id: key.course_id,
            semester: key.semester,
            year: key.year,
            marks: *marks,
            total_marks: total,
            grade: resolved.grade.to_string(),
            grade_points: resolved.grade_points,
            credit_hours,
            created_at,
            updated_at: now,
        },
        outcome,
    ))
}

/// Explicit edit of an existing record by id; the key stays fixed.
pub fn update_record(
    conn: &Connection,
    record_id: &str,
    marks: &MarkSet,
) -> Result<ExamRecord, GradingError> {
    let total = marks.total();
    let resolved = marks.grade();
    let changed = conn.execute(
        "UPDATE exam_records SET
           mid_exam = ?, final_exam = ?, assessment = ?, project = ?,
           assignment = ?, presentation = ?,
           total_marks = ?, grade = ?, grade_points = ?, updated_at = ?
         WHERE id = ?",
        rusqlite::params![
            marks.mid_exam,
            marks.final_exam,
            marks.assessment,
            marks.project,
            marks.assignment,
            marks.presentation,
            total,
            resolved.grade,
            resolved.grade_points,
            now_rfc3339(),
            record_id,
        ],
    )?;
    if changed == 0 {
        return Err(GradingError::not_found("exam record", record_id));
    }
    get_record(conn, record_id)?.ok_or_else(|| GradingError::not_found("exam record", record_id))
}

pub fn get_record(conn: &Connection, record_id: &str) -> rusqlite::Result<Option<ExamRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS}
         FROM exam_records r
         LEFT JOIN courses c ON c.id = r.course_id
         WHERE r.id = ?"
    );
    conn.query_row(&sql, [record_id], record_from_row).optional()
}

pub fn list_student_records(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<ExamRecord>, GradingError> {
    if !directory::student_exists(conn, student_id)? {
        return Err(GradingError::not_found("student", student_id));
    }
    let sql = format!(
        "SELECT {RECORD_COLUMNS}
         FROM exam_records r
         LEFT JOIN courses c ON c.id = r.course_id
         WHERE r.student_id = ?
         ORDER BY r.year, r.semester, r.course_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
