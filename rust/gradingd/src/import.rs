use crate::directory::{self, ClassContext};
use crate::error::GradingError;
use crate::marks::{validate_marks, MarkComponent, MarkInput, PartialMarkSet};
use crate::records::{upsert_record, ConflictPolicy, RecordKey, UpsertOutcome};
use crate::sheet::{read_sheet, Sheet};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportField {
    StudentId,
    Mark(MarkComponent),
}

/// Header pattern per semantic column, matched case-insensitively anywhere
/// in the header text. Earlier rules claim columns first.
const COLUMN_RULES: &[(&str, ImportField)] = &[
    (r"(?i)student[\s_-]*(id|no|num(ber)?|code)\b", ImportField::StudentId),
    (r"(?i)mid", ImportField::Mark(MarkComponent::MidExam)),
    (r"(?i)final", ImportField::Mark(MarkComponent::FinalExam)),
    (r"(?i)assess", ImportField::Mark(MarkComponent::Assessment)),
    (r"(?i)project", ImportField::Mark(MarkComponent::Project)),
    (r"(?i)assign", ImportField::Mark(MarkComponent::Assignment)),
    (r"(?i)present", ImportField::Mark(MarkComponent::Presentation)),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    pub student_id: Option<usize>,
    pub marks: Vec<(MarkComponent, usize)>,
}

impl ColumnMap {
    pub fn detect(header: &[String]) -> Result<Self, regex::Error> {
        let mut claimed = vec![false; header.len()];
        let mut map = ColumnMap {
            student_id: None,
            marks: Vec::new(),
        };
        for (pattern, field) in COLUMN_RULES {
            let re = Regex::new(pattern)?;
            let hit = header
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed[*i] && re.is_match(h.trim()))
                .map(|(i, _)| i);
            let Some(col) = hit else {
                continue;
            };
            claimed[col] = true;
            match field {
                ImportField::StudentId => map.student_id = Some(col),
                ImportField::Mark(c) => map.marks.push((*c, col)),
            }
        }
        Ok(map)
    }

    pub fn missing_marks(&self) -> Vec<MarkComponent> {
        MarkComponent::ALL
            .into_iter()
            .filter(|c| !self.marks.iter().any(|(m, _)| m == c))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub class_id: String,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub rows_seen: usize,
    pub missing_columns: Vec<&'static str>,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq)]
enum RowOutcome {
    Created,
    Updated,
    Skipped,
    Errored(String),
}

/// Lenient cell parsing: anything that is not a finite number counts as
/// an empty component. Range checks still happen in the validator.
fn parse_mark_cell(text: &str) -> MarkInput {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => MarkInput::Number(v),
        _ => MarkInput::Missing,
    }
}

fn process_row(
    conn: &Connection,
    sheet: &Sheet,
    row: usize,
    columns: &ColumnMap,
    student_col: usize,
    class: &ClassContext,
) -> RowOutcome {
    let code = sheet.cell(row, student_col).trim();
    if code.is_empty() {
        return RowOutcome::Skipped;
    }

    let student = match directory::find_student_by_code(conn, code) {
        Ok(Some(s)) => s,
        Ok(None) => return RowOutcome::Errored(format!("Student \"{code}\" not found")),
        Err(e) => return RowOutcome::Errored(format!("failed to look up student \"{code}\": {e}")),
    };

    let mut raw = PartialMarkSet::default();
    for (component, col) in &columns.marks {
        raw.set(*component, parse_mark_cell(sheet.cell(row, *col)));
    }
    let marks = match validate_marks(&raw) {
        Ok(m) => m,
        Err(violations) => {
            return RowOutcome::Errored(
                violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        }
    };

    let key = RecordKey {
        student_id: student.id,
        course_id: class.course_id.clone(),
        semester: class.semester.clone(),
        year: class.year,
    };
    match upsert_record(conn, &key, &marks, ConflictPolicy::Overwrite) {
        Ok((_, UpsertOutcome::Created)) => RowOutcome::Created,
        Ok((_, UpsertOutcome::Updated)) => RowOutcome::Updated,
        Err(e) => RowOutcome::Errored(e.to_string()),
    }
}

/// Imports one class's marks. Structural problems (unknown class, term not
/// in the registry, unreadable file, no Student ID column) fail the whole
/// batch; everything after that is collected per row and never aborts.
pub fn import_class_marks(
    conn: &Connection,
    class_id: &str,
    bytes: &[u8],
) -> Result<ImportBatch, GradingError> {
    let Some(mut class) = directory::class_context(conn, class_id)? else {
        return Err(GradingError::not_found("class", class_id));
    };
    let Some(semester) = directory::canonical_semester(conn, &class.semester)? else {
        return Err(GradingError::UnknownSemester(class.semester));
    };
    class.semester = semester;

    let sha256 = format!("{:x}", Sha256::digest(bytes));
    let sheet = read_sheet(bytes)
        .map_err(|e| GradingError::Structural(format!("unreadable spreadsheet: {e:#}")))?;

    let Some(header_row) = (0..sheet.rows.len()).find(|r| !sheet.row_is_blank(*r)) else {
        return Err(GradingError::Structural("spreadsheet is empty".into()));
    };
    let columns = ColumnMap::detect(&sheet.rows[header_row])
        .map_err(|e| GradingError::Structural(format!("bad column rule: {e}")))?;
    let Some(student_col) = columns.student_id else {
        return Err(GradingError::Structural(
            "Student ID column not found in header row".into(),
        ));
    };
    let missing = columns.missing_marks();
    if !missing.is_empty() {
        tracing::info!(class_id, ?missing, "mark columns absent; defaulting to 0");
    }

    let mut batch = ImportBatch {
        class_id: class_id.to_string(),
        created: 0,
        updated: 0,
        skipped: 0,
        errors: Vec::new(),
        rows_seen: 0,
        missing_columns: missing.iter().map(|c| c.label()).collect(),
        sha256,
    };

    for row in (header_row + 1)..sheet.rows.len() {
        if sheet.row_is_blank(row) {
            continue;
        }
        batch.rows_seen += 1;
        let outcome = process_row(conn, &sheet, row, &columns, student_col, &class);
        match outcome {
            RowOutcome::Created => batch.created += 1,
            RowOutcome::Updated => batch.updated += 1,
            RowOutcome::Skipped => batch.skipped += 1,
            RowOutcome::Errored(msg) => {
                let line = format!("Row {}: {}", row + 1, msg);
                tracing::debug!(class_id, row = row + 1, error = %msg, "import row rejected");
                batch.errors.push(line);
            }
        }
    }

    tracing::info!(
        class_id,
        created = batch.created,
        updated = batch.updated,
        skipped = batch.skipped,
        errored = batch.errors.len(),
        sha256 = %batch.sha256,
        "mark import finished"
    );
    Ok(batch)
}
