use crate::directory;
use crate::error::GradingError;
use crate::marks::round_2dp;
use crate::records::list_student_records;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterGpa {
    pub semester: String,
    pub year: i64,
    pub gpa: f64,
    pub total_credits: f64,
    pub total_grade_points: f64,
    pub course_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaSummary {
    pub student_id: String,
    #[serde(rename = "cumulativeGPA")]
    pub cumulative_gpa: f64,
    pub total_credits: f64,
    pub semesters: Vec<SemesterGpa>,
}

/// The slice of an exam record the aggregator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedCourse {
    pub semester: String,
    pub year: i64,
    pub credit_hours: f64,
    pub grade_points: f64,
}

#[derive(Debug, Default)]
struct Accumulator {
    credits: f64,
    weighted_points: f64,
    courses: usize,
}

impl Accumulator {
    fn add(&mut self, c: &GradedCourse) {
        self.credits += c.credit_hours;
        self.weighted_points += c.grade_points * c.credit_hours;
        self.courses += 1;
    }

    fn gpa(&self) -> f64 {
        if self.credits == 0.0 {
            0.0
        } else {
            round_2dp(self.weighted_points / self.credits)
        }
    }
}

/// Credit-weighted GPA per (semester, year) in chronological order, plus the
/// cumulative GPA over every course (not a mean of the semester GPAs).
/// Semesters missing from `ranks` sort as rank 0.
pub fn aggregate(
    courses: &[GradedCourse],
    ranks: &HashMap<String, i64>,
) -> (Vec<SemesterGpa>, f64, f64) {
    let mut groups: BTreeMap<(i64, i64, String), Accumulator> = BTreeMap::new();
    let mut overall = Accumulator::default();

    for c in courses {
        let rank = ranks
            .get(&c.semester.to_ascii_lowercase())
            .copied()
            .unwrap_or(0);
        groups
            .entry((c.year, rank, c.semester.clone()))
            .or_default()
            .add(c);
        overall.add(c);
    }

    let semesters = groups
        .into_iter()
        .map(|((year, _, semester), acc)| SemesterGpa {
            gpa: acc.gpa(),
            semester,
            year,
            total_credits: acc.credits,
            total_grade_points: round_2dp(acc.weighted_points),
            course_count: acc.courses,
        })
        .collect();

    (semesters, overall.gpa(), overall.credits)
}

/// Recomputed from the stored records on every call.
pub fn compute_gpa(conn: &Connection, student_id: &str) -> Result<GpaSummary, GradingError> {
    let records = list_student_records(conn, student_id)?;
    let ranks = directory::semester_ranks(conn)?;
    let courses: Vec<GradedCourse> = records
        .into_iter()
        .map(|r| GradedCourse {
            semester: r.semester,
            year: r.year,
            credit_hours: r.credit_hours,
            grade_points: r.grade_points,
        })
        .collect();

    let (semesters, cumulative_gpa, total_credits) = aggregate(&courses, &ranks);
    tracing::debug!(
        student_id,
        cumulative_gpa,
        total_credits,
        semesters = semesters.len(),
        "gpa computed"
    );

    Ok(GpaSummary {
        student_id: student_id.to_string(),
        cumulative_gpa,
        total_credits,
        semesters,
    })
}
