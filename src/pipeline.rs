//! Pipeline orchestration
//!
//! Runs a raw recording export through the full cleaning pipeline:
//! ingest → schema mapping → value sanitization → temporal rebasing.
//! The result is the canonical table the batch dispatcher slices up.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::EngineError;
use crate::ingest;
use crate::rebase::TimestampRebaser;
use crate::sanitize::Sanitizer;
use crate::schema;
use crate::types::GazeTable;

/// Clean a `;`-delimited CSV from any reader.
///
/// # Errors
/// Fails when the input is empty, unreadable, or maps to none of the
/// canonical columns. Everything else is repaired or flagged, not fatal.
pub fn clean_reader<R: Read>(reader: R) -> Result<GazeTable, EngineError> {
    let raw = ingest::read_table(reader)?;
    let mut table = schema::to_canonical(&raw)?;
    Sanitizer::sanitize(&mut table);
    TimestampRebaser::rebase(&mut table);

    tracing::info!(
        rows = table.n_rows,
        columns = ?table.retained_columns(),
        flags = table.flags.len(),
        "cleaned recording"
    );
    Ok(table)
}

/// Clean a recording export from a file path
pub fn clean_file(path: &Path) -> Result<GazeTable, EngineError> {
    tracing::info!(path = %path.display(), "cleaning recording file");
    let file = File::open(path)?;
    clean_reader(file)
}

/// Persist a cleaned table as a `;`-delimited CSV for inspection.
///
/// Only retained columns are written, in canonical order, so the export
/// re-ingests through the same pipeline.
pub fn write_cleaned_csv(table: &GazeTable, path: &Path) -> Result<(), EngineError> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
    writer.write_record(table.retained_columns())?;

    for row in 0..table.n_rows {
        let mut record: Vec<String> = Vec::new();
        for col in [
            &table.timestamp,
            &table.gazepoint_x,
            &table.gazepoint_y,
            &table.pupil_area_right_sq_mm,
            &table.pupil_area_left_sq_mm,
        ]
        .into_iter()
        .flatten()
        {
            record.push(format_numeric(col[row]));
        }
        if let Some(col) = &table.eye_event {
            record.push(col[row].clone());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Render a numeric cell without a trailing `.0` on whole values
fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
