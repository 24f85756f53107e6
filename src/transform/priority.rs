//! Integer priority → picklist label mapping.
//!
//! The same seven labels apply to task and project priorities. Values
//! outside [0, 1000] clamp to the boundary labels rather than failing the
//! record.

/// The seven labels, lowest first. Also the reference-sheet value set.
pub const PRIORITY_LABELS: [&str; 7] = [
    "Lowest",
    "Very Low",
    "Lower",
    "Medium",
    "Higher",
    "Very High",
    "Highest",
];

/// Source default when the field is absent.
pub const DEFAULT_PRIORITY: i64 = 500;

/// Piecewise mapping of the source 0..1000 priority scale.
pub fn priority_label(priority: i64) -> &'static str {
    match priority {
        p if p >= 1000 => "Highest",
        p if p >= 800 => "Very High",
        p if p >= 600 => "Higher",
        p if p >= 500 => "Medium",
        p if p >= 400 => "Lower",
        p if p >= 200 => "Very Low",
        _ => "Lowest",
    }
}

/// Label for an optional priority, defaulting to 500 (Medium).
pub fn priority_label_or_default(priority: Option<i64>) -> &'static str {
    priority_label(priority.unwrap_or(DEFAULT_PRIORITY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_values() {
        assert_eq!(priority_label(0), "Lowest");
        assert_eq!(priority_label(200), "Very Low");
        assert_eq!(priority_label(400), "Lower");
        assert_eq!(priority_label(500), "Medium");
        assert_eq!(priority_label(600), "Higher");
        assert_eq!(priority_label(800), "Very High");
        assert_eq!(priority_label(1000), "Highest");
    }

    #[test]
    fn test_interior_values() {
        assert_eq!(priority_label(199), "Lowest");
        assert_eq!(priority_label(499), "Lower");
        assert_eq!(priority_label(999), "Very High");
    }

    #[test]
    fn test_totality_over_range() {
        for p in 0..=1000 {
            let label = priority_label(p);
            assert!(PRIORITY_LABELS.contains(&label), "no label for {p}");
        }
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(priority_label(-5), "Lowest");
        assert_eq!(priority_label(40_000), "Highest");
    }

    #[test]
    fn test_absent_defaults_to_medium() {
        assert_eq!(priority_label_or_default(None), "Medium");
        assert_eq!(priority_label_or_default(Some(800)), "Very High");
    }
}
