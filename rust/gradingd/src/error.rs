use crate::marks::MarkViolation;
use crate::records::RecordKey;

#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("{}", join_violations(.0))]
    Validation(Vec<MarkViolation>),

    #[error("unrecognized semester: {0}")]
    UnknownSemester(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("an exam record already exists for {0}")]
    Conflict(RecordKey),

    #[error("{0}")]
    Structural(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl GradingError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::UnknownSemester(_) => "invalid_semester",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Structural(_) => "bad_spreadsheet",
            Self::Db(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(v) => Some(serde_json::json!({ "violations": v })),
            Self::NotFound { entity, id } => {
                Some(serde_json::json!({ "entity": entity, "id": id }))
            }
            Self::Conflict(key) => Some(serde_json::json!({ "key": key })),
            _ => None,
        }
    }
}

fn join_violations(v: &[MarkViolation]) -> String {
    v.iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
