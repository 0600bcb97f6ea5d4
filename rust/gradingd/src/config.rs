use crate::db;
use crate::records::ConflictPolicy;
use crate::sheet::SheetFormat;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Grading,
}

impl SetupSection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradingConfig {
    pub manual_conflict_policy: ConflictPolicy,
    pub default_template_format: SheetFormat,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            manual_conflict_policy: ConflictPolicy::Reject,
            default_template_format: SheetFormat::Xlsx,
        }
    }
}

pub fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => {
            let d = GradingConfig::default();
            json!({
                "manualConflictPolicy": d.manual_conflict_policy.as_str(),
                "defaultTemplateFormat": d.default_template_format.as_str(),
            })
        }
    }
}

fn parse_choice(v: &Value, key: &str, allowed: &[&str]) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be string", key))?
        .trim()
        .to_ascii_lowercase();
    if !allowed.contains(&s.as_str()) {
        return Err(format!("{} must be one of: {}", key, allowed.join(", ")));
    }
    Ok(s)
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "manualConflictPolicy" => {
                    let p = parse_choice(v, k, &["reject", "overwrite"])?;
                    obj.insert(k.clone(), Value::String(p));
                }
                "defaultTemplateFormat" => {
                    let f = parse_choice(v, k, &["xlsx", "csv"])?;
                    obj.insert(k.clone(), Value::String(f));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Stale or malformed saved values fall back to defaults.
            let mut candidate = current.clone();
            if merge_section_patch(section, &mut candidate, saved_obj).is_ok() {
                current = candidate;
            } else {
                tracing::warn!(key = section.key(), "ignoring malformed saved settings");
            }
        }
    }
    Ok(current)
}

pub fn update_section(
    conn: &Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn, section)?;
    if let Err(msg) = merge_section_patch(section, &mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, section.key(), &current)?;
    Ok(Ok(current))
}

pub fn grading_config(conn: &Connection) -> anyhow::Result<GradingConfig> {
    let v = load_section(conn, SetupSection::Grading)?;
    let d = GradingConfig::default();
    Ok(GradingConfig {
        manual_conflict_policy: v
            .get("manualConflictPolicy")
            .and_then(|x| x.as_str())
            .and_then(ConflictPolicy::parse)
            .unwrap_or(d.manual_conflict_policy),
        default_template_format: v
            .get("defaultTemplateFormat")
            .and_then(|x| x.as_str())
            .and_then(SheetFormat::parse)
            .unwrap_or(d.default_template_format),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn defaults_reject_and_xlsx() {
        let c = grading_config(&conn()).expect("config");
        assert_eq!(c, GradingConfig::default());
        assert_eq!(c.manual_conflict_policy, ConflictPolicy::Reject);
    }

    #[test]
    fn update_validates_and_persists() {
        let conn = conn();
        let patch = json!({ "manualConflictPolicy": "Overwrite" });
        let saved = update_section(&conn, SetupSection::Grading, patch.as_object().expect("obj"))
            .expect("db")
            .expect("valid");
        assert_eq!(saved["manualConflictPolicy"], "overwrite");
        assert_eq!(saved["defaultTemplateFormat"], "xlsx");
        assert_eq!(
            grading_config(&conn).expect("config").manual_conflict_policy,
            ConflictPolicy::Overwrite
        );

        let bad = json!({ "defaultTemplateFormat": "ods" });
        let msg = update_section(&conn, SetupSection::Grading, bad.as_object().expect("obj"))
            .expect("db")
            .expect_err("invalid");
        assert!(msg.contains("xlsx, csv"));

        let unknown = json!({ "gpaScale": 5 });
        assert!(update_section(&conn, SetupSection::Grading, unknown.as_object().expect("obj"))
            .expect("db")
            .is_err());
    }

    #[test]
    fn malformed_saved_settings_fall_back_to_defaults() {
        let conn = conn();
        db::settings_set_json(&conn, "setup.grading", &json!({ "manualConflictPolicy": 7 }))
            .expect("set");
        assert_eq!(grading_config(&conn).expect("config"), GradingConfig::default());
    }
}
