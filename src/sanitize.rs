//! Value sanitization
//!
//! Applies the fixed cleaning steps to a canonical table, in an order later
//! steps depend on:
//! 1. missing eye events become the literal `"NA"`
//! 2. an all-zero left pupil column is dropped (sensor absent)
//! 3. surviving left pupil values are capped at the outlier ceiling
//! 4. non-constant pupil columns are min-max rescaled to [0, 1]
//! 5. string cells are trimmed
//!
//! The sanitizer transforms or drops columns and cells, never rows. Every
//! step is conditional on its column being present; absent optional columns
//! are not an error.

use crate::schema::{COL_PUPIL_LEFT, COL_PUPIL_RIGHT};
use crate::types::{CleaningFlag, GazeTable};

/// Ceiling applied to left pupil area before rescaling (clamp, not discard)
pub const PUPIL_LEFT_MAX_SQ_MM: f64 = 1000.0;

/// Label substituted for a missing eye event
pub const MISSING_EYE_EVENT: &str = "NA";

/// Sanitizer for canonical gaze tables
pub struct Sanitizer;

impl Sanitizer {
    /// Run all sanitation steps in order, recording flags on the table
    pub fn sanitize(table: &mut GazeTable) {
        fill_missing_eye_events(table);
        drop_dead_left_pupil(table);
        cap_left_pupil_outliers(table);
        rescale_pupil_columns(table);
        trim_string_cells(table);
    }
}

/// Step 1: substitute `"NA"` for empty eye event cells
fn fill_missing_eye_events(table: &mut GazeTable) {
    if let Some(col) = table.eye_event.as_mut() {
        for cell in col.iter_mut() {
            if cell.is_empty() {
                *cell = MISSING_EYE_EVENT.to_string();
            }
        }
    }
}

/// Step 2: drop the left pupil column entirely when every value is zero
fn drop_dead_left_pupil(table: &mut GazeTable) {
    if let Some(col) = &table.pupil_area_left_sq_mm {
        if !col.is_empty() && col.iter().all(|v| *v == 0.0) {
            tracing::warn!(column = COL_PUPIL_LEFT, "dropping all-zero column");
            table.pupil_area_left_sq_mm = None;
            table.flags.push(CleaningFlag::DroppedAllZeroColumn {
                column: COL_PUPIL_LEFT.to_string(),
            });
        }
    }
}

/// Step 3: clamp left pupil values to [`PUPIL_LEFT_MAX_SQ_MM`]
fn cap_left_pupil_outliers(table: &mut GazeTable) {
    if let Some(col) = table.pupil_area_left_sq_mm.as_mut() {
        let mut capped = 0usize;
        for value in col.iter_mut() {
            if *value > PUPIL_LEFT_MAX_SQ_MM {
                *value = PUPIL_LEFT_MAX_SQ_MM;
                capped += 1;
            }
        }
        if capped > 0 {
            tracing::info!(column = COL_PUPIL_LEFT, count = capped, "capped outliers");
            table.flags.push(CleaningFlag::OutliersCapped {
                column: COL_PUPIL_LEFT.to_string(),
                count: capped,
            });
        }
    }
}

/// Step 4: min-max rescale each pupil column that has more than one distinct value
fn rescale_pupil_columns(table: &mut GazeTable) {
    let mut flags = Vec::new();
    for (name, col) in [
        (COL_PUPIL_RIGHT, table.pupil_area_right_sq_mm.as_mut()),
        (COL_PUPIL_LEFT, table.pupil_area_left_sq_mm.as_mut()),
    ] {
        if let Some(col) = col {
            if let Some(flag) = rescale_column(name, col) {
                flags.push(flag);
            }
        }
    }
    table.flags.extend(flags);
}

/// Rescale one column to [0, 1], rounded to 2 decimals.
///
/// A constant column is left untouched: rescaling it would divide by zero,
/// so the skip is flagged instead.
fn rescale_column(name: &str, col: &mut [f64]) -> Option<CleaningFlag> {
    let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if col.is_empty() || min == max {
        tracing::warn!(column = name, "skipping rescale of constant column");
        return Some(CleaningFlag::RescaleSkippedConstant {
            column: name.to_string(),
        });
    }

    let span = max - min;
    for value in col.iter_mut() {
        *value = (((*value - min) / span) * 100.0).round() / 100.0;
    }
    None
}

/// Step 5: trim leading/trailing whitespace on every string cell
fn trim_string_cells(table: &mut GazeTable) {
    if let Some(col) = table.eye_event.as_mut() {
        for cell in col.iter_mut() {
            if cell.trim().len() != cell.len() {
                let trimmed = cell.trim().to_string();
                *cell = trimmed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table_with(
        right: Option<Vec<f64>>,
        left: Option<Vec<f64>>,
        eye_event: Option<Vec<&str>>,
    ) -> GazeTable {
        let n_rows = right
            .as_ref()
            .map(Vec::len)
            .or(left.as_ref().map(Vec::len))
            .or(eye_event.as_ref().map(Vec::len))
            .unwrap_or(0);
        GazeTable {
            n_rows,
            timestamp: None,
            gazepoint_x: None,
            gazepoint_y: None,
            pupil_area_right_sq_mm: right,
            pupil_area_left_sq_mm: left,
            eye_event: eye_event.map(|col| col.into_iter().map(String::from).collect()),
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_missing_eye_events_become_na() {
        let mut table = table_with(None, None, Some(vec!["", "Fixation", ""]));
        Sanitizer::sanitize(&mut table);

        assert_eq!(
            table.eye_event,
            Some(vec![
                "NA".to_string(),
                "Fixation".to_string(),
                "NA".to_string()
            ])
        );
    }

    #[test]
    fn test_string_cells_are_trimmed() {
        let mut table = table_with(None, None, Some(vec![" Saccade ", "Blink"]));
        Sanitizer::sanitize(&mut table);

        assert_eq!(
            table.eye_event,
            Some(vec!["Saccade".to_string(), "Blink".to_string()])
        );
    }

    #[test]
    fn test_all_zero_left_pupil_is_dropped() {
        let mut table = table_with(Some(vec![3.0, 4.0]), Some(vec![0.0, 0.0]), None);
        Sanitizer::sanitize(&mut table);

        assert_eq!(table.pupil_area_left_sq_mm, None);
        assert!(table.flags.contains(&CleaningFlag::DroppedAllZeroColumn {
            column: "pupil_area_left_sq_mm".to_string()
        }));
    }

    #[test]
    fn test_all_zero_right_pupil_is_kept() {
        // Only the left column carries the sensor-absent convention
        let mut table = table_with(Some(vec![0.0, 0.0]), None, None);
        Sanitizer::sanitize(&mut table);

        assert_eq!(table.pupil_area_right_sq_mm, Some(vec![0.0, 0.0]));
        assert!(table.flags.contains(&CleaningFlag::RescaleSkippedConstant {
            column: "pupil_area_right_sq_mm".to_string()
        }));
    }

    #[test]
    fn test_left_pupil_outliers_are_capped_not_discarded() {
        let mut table = table_with(None, Some(vec![2000.0, 2000.0]), None);
        Sanitizer::sanitize(&mut table);

        // Capped to the ceiling, then left alone by the constant-column rule
        assert_eq!(table.pupil_area_left_sq_mm, Some(vec![1000.0, 1000.0]));
        assert!(table.flags.contains(&CleaningFlag::OutliersCapped {
            column: "pupil_area_left_sq_mm".to_string(),
            count: 2
        }));
        assert!(table.flags.contains(&CleaningFlag::RescaleSkippedConstant {
            column: "pupil_area_left_sq_mm".to_string()
        }));
    }

    #[test]
    fn test_min_max_rescale_maps_extremes_to_unit_interval() {
        let mut table = table_with(Some(vec![2.0, 4.0, 6.0]), Some(vec![10.0, 1510.0]), None);
        Sanitizer::sanitize(&mut table);

        assert_eq!(table.pupil_area_right_sq_mm, Some(vec![0.0, 0.5, 1.0]));
        // Left was capped to [10, 1000] first, then rescaled
        assert_eq!(table.pupil_area_left_sq_mm, Some(vec![0.0, 1.0]));
    }

    #[test]
    fn test_rescale_rounds_to_two_decimals() {
        let mut table = table_with(Some(vec![1.0, 2.0, 4.0]), None, None);
        Sanitizer::sanitize(&mut table);

        assert_eq!(table.pupil_area_right_sq_mm, Some(vec![0.0, 0.33, 1.0]));
    }

    #[test]
    fn test_constant_column_is_untouched_and_flagged() {
        let mut table = table_with(Some(vec![5.5, 5.5, 5.5]), None, None);
        Sanitizer::sanitize(&mut table);

        assert_eq!(table.pupil_area_right_sq_mm, Some(vec![5.5, 5.5, 5.5]));
        assert_eq!(
            table.flags,
            vec![CleaningFlag::RescaleSkippedConstant {
                column: "pupil_area_right_sq_mm".to_string()
            }]
        );
    }

    #[test]
    fn test_rows_are_never_dropped_or_reordered() {
        let mut table = table_with(
            Some(vec![1.0, 3.0, 2.0]),
            Some(vec![0.0, 500.0, 1200.0]),
            Some(vec!["a", "", "c"]),
        );
        Sanitizer::sanitize(&mut table);

        assert_eq!(table.n_rows, 3);
        assert_eq!(table.pupil_area_right_sq_mm.as_ref().unwrap().len(), 3);
        assert_eq!(table.pupil_area_left_sq_mm.as_ref().unwrap().len(), 3);
        // Relative order preserved: middle value is still the largest
        assert_eq!(table.pupil_area_right_sq_mm, Some(vec![0.0, 1.0, 0.5]));
    }

    #[test]
    fn test_absent_columns_are_not_an_error() {
        let mut table = table_with(None, None, None);
        Sanitizer::sanitize(&mut table);
        assert!(table.flags.is_empty());
    }
}
