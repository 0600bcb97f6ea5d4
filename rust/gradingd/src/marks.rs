use crate::scale::{resolve_grade, ResolvedGrade};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absorbs float noise in sums like 19.9 + 40 + 30.1 without moving a
/// genuine 89.996 across the 90 cutoff.
const GRADE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkComponent {
    MidExam,
    FinalExam,
    Assessment,
    Project,
    Assignment,
    Presentation,
}

impl MarkComponent {
    /// Fixed column order shared by the template and the importer.
    pub const ALL: [MarkComponent; 6] = [
        Self::MidExam,
        Self::FinalExam,
        Self::Assessment,
        Self::Project,
        Self::Assignment,
        Self::Presentation,
    ];

    pub fn max(self) -> f64 {
        match self {
            Self::MidExam => 20.0,
            Self::FinalExam => 40.0,
            Self::Assessment | Self::Project | Self::Assignment | Self::Presentation => 10.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MidExam => "Mid Exam",
            Self::FinalExam => "Final Exam",
            Self::Assessment => "Assessment",
            Self::Project => "Project",
            Self::Assignment => "Assignment",
            Self::Presentation => "Presentation",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::MidExam => "midExam",
            Self::FinalExam => "finalExam",
            Self::Assessment => "assessment",
            Self::Project => "project",
            Self::Assignment => "assignment",
            Self::Presentation => "presentation",
        }
    }

    /// Header text written into templates, e.g. `Mid Exam (/20)`.
    pub fn header(self) -> String {
        format!("{} (/{})", self.label(), self.max())
    }

    fn index(self) -> usize {
        match self {
            Self::MidExam => 0,
            Self::FinalExam => 1,
            Self::Assessment => 2,
            Self::Project => 3,
            Self::Assignment => 4,
            Self::Presentation => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MarkInput {
    #[default]
    Missing,
    Number(f64),
    Invalid(String),
}

/// Raw, possibly incomplete components as submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMarkSet {
    values: [MarkInput; 6],
}

impl PartialMarkSet {
    pub fn set(&mut self, component: MarkComponent, input: MarkInput) {
        self.values[component.index()] = input;
    }

    #[cfg(test)]
    pub fn with(mut self, component: MarkComponent, value: f64) -> Self {
        self.set(component, MarkInput::Number(value));
        self
    }

    pub fn get(&self, component: MarkComponent) -> &MarkInput {
        &self.values[component.index()]
    }

    /// Reads `{midExam, finalExam, ...}` from a JSON object. Numbers and
    /// numeric strings are accepted; null, blank strings and absent keys
    /// are missing; anything else is kept as invalid for the validator.
    pub fn from_json(raw: &serde_json::Value) -> Self {
        let mut out = Self::default();
        for component in MarkComponent::ALL {
            let input = match raw.get(component.key()) {
                None | Some(serde_json::Value::Null) => MarkInput::Missing,
                Some(serde_json::Value::Number(n)) => match n.as_f64() {
                    Some(v) => MarkInput::Number(v),
                    None => MarkInput::Invalid(n.to_string()),
                },
                Some(serde_json::Value::String(s)) => {
                    let t = s.trim();
                    if t.is_empty() {
                        MarkInput::Missing
                    } else {
                        match t.parse::<f64>() {
                            Ok(v) if v.is_finite() => MarkInput::Number(v),
                            _ => MarkInput::Invalid(t.to_string()),
                        }
                    }
                }
                Some(other) => MarkInput::Invalid(other.to_string()),
            };
            out.set(component, input);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSet {
    pub mid_exam: f64,
    pub final_exam: f64,
    pub assessment: f64,
    pub project: f64,
    pub assignment: f64,
    pub presentation: f64,
}

impl MarkSet {
    pub fn get(&self, component: MarkComponent) -> f64 {
        match component {
            MarkComponent::MidExam => self.mid_exam,
            MarkComponent::FinalExam => self.final_exam,
            MarkComponent::Assessment => self.assessment,
            MarkComponent::Project => self.project,
            MarkComponent::Assignment => self.assignment,
            MarkComponent::Presentation => self.presentation,
        }
    }

    fn set(&mut self, component: MarkComponent, value: f64) {
        match component {
            MarkComponent::MidExam => self.mid_exam = value,
            MarkComponent::FinalExam => self.final_exam = value,
            MarkComponent::Assessment => self.assessment = value,
            MarkComponent::Project => self.project = value,
            MarkComponent::Assignment => self.assignment = value,
            MarkComponent::Presentation => self.presentation = value,
        }
    }

    pub fn sum(&self) -> f64 {
        MarkComponent::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Stored and displayed total, rounded to 2 decimals.
    pub fn total(&self) -> f64 {
        round_2dp(self.sum())
    }

    /// Grade of the unrounded sum.
    pub fn grade(&self) -> ResolvedGrade {
        resolve_grade(self.sum() + GRADE_EPSILON)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NotNumeric,
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkViolation {
    pub component: MarkComponent,
    pub kind: ViolationKind,
    pub value: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for MarkViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::OutOfRange => write!(
                f,
                "{} must be {}-{}",
                self.component.label(),
                self.min,
                self.max
            ),
            ViolationKind::NotNumeric => write!(f, "{} must be a number", self.component.label()),
        }
    }
}

/// Checks every component against its closed range; missing components
/// default to 0. Reports one violation per offending component.
pub fn validate_marks(raw: &PartialMarkSet) -> Result<MarkSet, Vec<MarkViolation>> {
    let mut marks = MarkSet::default();
    let mut violations = Vec::new();

    for component in MarkComponent::ALL {
        let max = component.max();
        match raw.get(component) {
            MarkInput::Missing => {}
            MarkInput::Number(v) if v.is_finite() && (0.0..=max).contains(v) => {
                marks.set(component, *v);
            }
            MarkInput::Number(v) if v.is_finite() => violations.push(MarkViolation {
                component,
                kind: ViolationKind::OutOfRange,
                value: Some(*v),
                min: 0.0,
                max,
            }),
            MarkInput::Number(_) | MarkInput::Invalid(_) => violations.push(MarkViolation {
                component,
                kind: ViolationKind::NotNumeric,
                value: None,
                min: 0.0,
                max,
            }),
        }
    }

    if violations.is_empty() {
        Ok(marks)
    } else {
        Err(violations)
    }
}

pub fn round_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
