//! ISO-8601 duration parsing and the two output renderings.
//!
//! The source emits durations like `PT40H`, `PT480M`, `P5D`, or mixed forms.
//! A day designator means one working day (8 hours). Year and month
//! designators are rejected outright — converting them with a calendar guess
//! would silently corrupt schedules.

use crate::error::{MigrationError, Result};

/// Working hours per day, for the day designator and the days rendering.
const HOURS_PER_DAY: f64 = 8.0;

/// Parse an ISO-8601 duration into total hours.
pub fn parse_hours(input: &str) -> Result<f64> {
    let s = input.trim();
    let mut chars = s.chars().peekable();
    if chars.next() != Some('P') {
        return Err(MigrationError::validation(format!(
            "duration {input:?} does not start with P"
        )));
    }

    let mut hours = 0.0f64;
    let mut in_time = false;
    let mut saw_component = false;

    let mut number = String::new();
    for c in chars {
        match c {
            'T' | 't' => {
                if in_time || !number.is_empty() {
                    return Err(MigrationError::validation(format!(
                        "duration {input:?} has a misplaced time designator"
                    )));
                }
                in_time = true;
            }
            d if d.is_ascii_digit() || d == '.' => number.push(d),
            designator => {
                let value: f64 = number.parse().map_err(|_| {
                    MigrationError::validation(format!(
                        "duration {input:?} has a malformed number before {designator:?}"
                    ))
                })?;
                number.clear();
                saw_component = true;
                match (designator.to_ascii_uppercase(), in_time) {
                    ('D', false) => hours += value * HOURS_PER_DAY,
                    ('W', false) => {
                        return Err(MigrationError::validation(format!(
                            "duration {input:?} uses the week designator, which the source never emits"
                        )))
                    }
                    ('Y', false) | ('M', false) => {
                        return Err(MigrationError::validation(format!(
                            "duration {input:?} uses a calendar designator ({designator}) with no fixed hour length"
                        )))
                    }
                    ('H', true) => hours += value,
                    ('M', true) => hours += value / 60.0,
                    ('S', true) => hours += value / 3600.0,
                    _ => {
                        return Err(MigrationError::validation(format!(
                            "duration {input:?} has unknown designator {designator:?}"
                        )))
                    }
                }
            }
        }
    }

    if !number.is_empty() {
        return Err(MigrationError::validation(format!(
            "duration {input:?} ends with a dangling number"
        )));
    }
    if !saw_component {
        return Err(MigrationError::validation(format!(
            "duration {input:?} has no components"
        )));
    }
    Ok(hours)
}

/// Decimal days for the project Duration system column, rounded to 2 places.
pub fn to_project_days(hours: f64) -> f64 {
    (hours / HOURS_PER_DAY * 100.0).round() / 100.0
}

/// Text rendering for non-system Work/ActualWork columns, e.g. `"40h"`.
pub fn to_work_text(hours: f64) -> String {
    if (hours - hours.round()).abs() < 1e-9 {
        format!("{}h", hours.round() as i64)
    } else {
        let rounded = (hours * 100.0).round() / 100.0;
        format!("{rounded}h")
    }
}
