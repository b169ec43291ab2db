//! Canonical schema mapping
//!
//! Eye trackers export wildly inconsistent column headers. This stage strips
//! and lowercases them, rewrites punctuation, maps the survivors through a
//! fixed lookup onto the canonical six-field schema, and parses the retained
//! columns into a typed [`GazeTable`]. Columns the lookup does not know are
//! dropped; known columns absent from the input are simply absent downstream.

use crate::error::EngineError;
use crate::ingest::RawTable;
use crate::types::{CleaningFlag, GazeTable};

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_GAZEPOINT_X: &str = "gazepoint_x";
pub const COL_GAZEPOINT_Y: &str = "gazepoint_y";
pub const COL_PUPIL_RIGHT: &str = "pupil_area_right_sq_mm";
pub const COL_PUPIL_LEFT: &str = "pupil_area_left_sq_mm";
pub const COL_EYE_EVENT: &str = "eye_event";

/// The canonical column set, in output order
pub const CANONICAL_COLUMNS: [&str; 6] = [
    COL_TIMESTAMP,
    COL_GAZEPOINT_X,
    COL_GAZEPOINT_Y,
    COL_PUPIL_RIGHT,
    COL_PUPIL_LEFT,
    COL_EYE_EVENT,
];

/// Normalized header → canonical field lookup.
///
/// Includes the canonical names themselves so a cleaned export re-ingests.
const COLUMN_MAPPING: [(&str, &str); 8] = [
    ("timestamp", COL_TIMESTAMP),
    ("gazepoint_x", COL_GAZEPOINT_X),
    ("gazepoint_y", COL_GAZEPOINT_Y),
    ("pupil_area_(right)_sq_mm", COL_PUPIL_RIGHT),
    ("pupil_area_(left)_sq_mm", COL_PUPIL_LEFT),
    ("pupil_area_right_sq_mm", COL_PUPIL_RIGHT),
    ("pupil_area_left_sq_mm", COL_PUPIL_LEFT),
    ("eye_event", COL_EYE_EVENT),
];

/// Accepted normalized header → canonical field pairs
pub fn column_mapping() -> &'static [(&'static str, &'static str)] {
    &COLUMN_MAPPING
}

/// Normalize a raw header: strip, drop commas, spaces to underscores, lowercase
pub fn normalize_header(raw: &str) -> String {
    raw.trim().replace(',', "").replace(' ', "_").to_lowercase()
}

/// Canonical field a normalized header maps to, if any
pub fn canonical_target(normalized: &str) -> Option<&'static str> {
    COLUMN_MAPPING
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| *canonical)
}

/// Map a raw table onto the canonical schema and parse it into typed columns.
///
/// Fails with [`EngineError::MissingColumns`] when not a single canonical
/// column survives the mapping. Rows with an empty or unparseable cell in a
/// retained numeric column are discarded and counted, so every numeric cell
/// of the result is a real value.
pub fn to_canonical(raw: &RawTable) -> Result<GazeTable, EngineError> {
    let mut found = Vec::with_capacity(raw.headers.len());
    let mut mapped: Vec<(usize, &'static str)> = Vec::new();

    for (idx, header) in raw.headers.iter().enumerate() {
        let normalized = normalize_header(header);
        if let Some(canonical) = canonical_target(&normalized) {
            if mapped.iter().any(|(_, c)| *c == canonical) {
                tracing::warn!(column = canonical, "duplicate column after mapping, keeping the first");
            } else {
                mapped.push((idx, canonical));
            }
        } else {
            tracing::debug!(header = %normalized, "dropping unmapped column");
        }
        found.push(normalized);
    }

    if mapped.is_empty() {
        return Err(EngineError::MissingColumns {
            found,
            expected: CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        });
    }

    let index_of = |canonical: &str| {
        mapped
            .iter()
            .find(|(_, c)| *c == canonical)
            .map(|(idx, _)| *idx)
    };

    let ts_idx = index_of(COL_TIMESTAMP);
    let gx_idx = index_of(COL_GAZEPOINT_X);
    let gy_idx = index_of(COL_GAZEPOINT_Y);
    let pr_idx = index_of(COL_PUPIL_RIGHT);
    let pl_idx = index_of(COL_PUPIL_LEFT);
    let ee_idx = index_of(COL_EYE_EVENT);

    let numeric_indexes = [ts_idx, gx_idx, gy_idx, pr_idx, pl_idx];
    let mut timestamp = ts_idx.map(|_| Vec::with_capacity(raw.rows.len()));
    let mut gazepoint_x = gx_idx.map(|_| Vec::with_capacity(raw.rows.len()));
    let mut gazepoint_y = gy_idx.map(|_| Vec::with_capacity(raw.rows.len()));
    let mut pupil_right = pr_idx.map(|_| Vec::with_capacity(raw.rows.len()));
    let mut pupil_left = pl_idx.map(|_| Vec::with_capacity(raw.rows.len()));
    let mut eye_event = ee_idx.map(|_| Vec::with_capacity(raw.rows.len()));

    let mut discarded = 0usize;

    'rows: for row in &raw.rows {
        let mut values = [0.0f64; 5];
        for (slot, idx) in numeric_indexes.iter().enumerate() {
            if let Some(idx) = idx {
                match parse_numeric(&row[*idx]) {
                    Some(value) => values[slot] = value,
                    None => {
                        discarded += 1;
                        continue 'rows;
                    }
                }
            }
        }

        if let Some(col) = timestamp.as_mut() {
            col.push(values[0]);
        }
        if let Some(col) = gazepoint_x.as_mut() {
            col.push(values[1]);
        }
        if let Some(col) = gazepoint_y.as_mut() {
            col.push(values[2]);
        }
        if let Some(col) = pupil_right.as_mut() {
            col.push(values[3]);
        }
        if let Some(col) = pupil_left.as_mut() {
            col.push(values[4]);
        }
        if let (Some(col), Some(idx)) = (eye_event.as_mut(), ee_idx) {
            col.push(row[idx].clone());
        }
    }

    let n_rows = raw.rows.len() - discarded;
    let mut flags = Vec::new();
    let dropped = discarded + raw.rows_skipped;
    if dropped > 0 {
        tracing::warn!(count = dropped, "discarded rows during ingest and typed parse");
        flags.push(CleaningFlag::RowsDiscarded { count: dropped });
    }

    tracing::debug!(
        rows = n_rows,
        columns = ?mapped.iter().map(|(_, c)| *c).collect::<Vec<_>>(),
        "mapped raw table onto canonical schema"
    );

    Ok(GazeTable {
        n_rows,
        timestamp,
        gazepoint_x,
        gazepoint_y,
        pupil_area_right_sq_mm: pupil_right,
        pupil_area_left_sq_mm: pupil_left,
        eye_event,
        flags,
    })
}

/// Parse one numeric cell; empty and non-numeric cells are `None`
fn parse_numeric(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}
