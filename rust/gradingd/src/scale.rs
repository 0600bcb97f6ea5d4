use serde::Serialize;

/// (minimum total, letter grade, quality points), highest minimum first.
pub const GRADE_SCALE: &[(f64, &str, f64)] = &[
    (90.0, "A", 4.0),
    (85.0, "A-", 3.7),
    (80.0, "B+", 3.3),
    (75.0, "B", 3.0),
    (70.0, "B-", 2.7),
    (65.0, "C+", 2.3),
    (60.0, "C", 2.0),
    (50.0, "D", 1.0),
    (0.0, "F", 0.0),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGrade {
    pub grade: &'static str,
    pub grade_points: f64,
}

/// Ordered scan of `GRADE_SCALE`. Totals outside 0..=100 saturate instead of
/// failing: anything under the last minimum (including NaN) resolves to F.
pub fn resolve_grade(total: f64) -> ResolvedGrade {
    for &(min, grade, grade_points) in GRADE_SCALE {
        if min <= total {
            return ResolvedGrade {
                grade,
                grade_points,
            };
        }
    }
    ResolvedGrade {
        grade: "F",
        grade_points: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_exact() {
        let cases: &[(f64, &str)] = &[
            (100.0, "A"),
            (90.0, "A"),
            (89.99, "A-"),
            (85.0, "A-"),
            (84.99, "B+"),
            (80.0, "B+"),
            (79.99, "B"),
            (75.0, "B"),
            (74.99, "B-"),
            (70.0, "B-"),
            (69.99, "C+"),
            (65.0, "C+"),
            (64.99, "C"),
            (60.0, "C"),
            (59.99, "D"),
            (50.0, "D"),
            (49.99, "F"),
            (0.0, "F"),
        ];
        for &(total, want) in cases {
            assert_eq!(resolve_grade(total).grade, want, "total {total}");
        }
    }

    #[test]
    fn out_of_range_totals_saturate() {
        assert_eq!(resolve_grade(150.0).grade, "A");
        assert_eq!(resolve_grade(150.0).grade_points, 4.0);
        assert_eq!(resolve_grade(-5.0).grade, "F");
        assert_eq!(resolve_grade(-5.0).grade_points, 0.0);
        assert_eq!(resolve_grade(f64::NAN).grade, "F");
    }

    #[test]
    fn points_follow_table() {
        assert_eq!(resolve_grade(86.0).grade_points, 3.7);
        assert_eq!(resolve_grade(77.5).grade_points, 3.0);
        assert_eq!(resolve_grade(51.0).grade_points, 1.0);
    }

    #[test]
    fn table_is_strictly_descending() {
        for pair in GRADE_SCALE.windows(2) {
            assert!(pair[0].0 > pair[1].0);
        }
        assert_eq!(GRADE_SCALE.last().map(|r| r.0), Some(0.0));
    }
}
