//! CSV ingest
//!
//! Reads a `;`-delimited recording export into an untyped table of strings.
//! Ingest is deliberately tolerant: a line whose field count does not match
//! the header is skipped and counted, never fatal. Typing and cleaning happen
//! downstream in the schema and sanitizer stages.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::EngineError;

/// Untyped tabular data exactly as read from the upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Header cells, verbatim (normalization happens in the schema stage)
    pub headers: Vec<String>,
    /// Data rows; every row has exactly `headers.len()` cells
    pub rows: Vec<Vec<String>>,
    /// Lines dropped for a mismatched field count or encoding error
    pub rows_skipped: usize,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a `;`-delimited CSV from any reader.
///
/// Fails with [`EngineError::EmptyInput`] when there is no usable header row.
pub fn read_table<R: Read>(reader: R) -> Result<RawTable, EngineError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|_| EngineError::EmptyInput)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(EngineError::EmptyInput);
    }

    let mut rows = Vec::new();
    let mut rows_skipped = 0usize;

    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable CSV line");
                rows_skipped += 1;
                continue;
            }
        };

        if record.len() != headers.len() {
            tracing::warn!(
                expected = headers.len(),
                actual = record.len(),
                "skipping CSV line with mismatched field count"
            );
            rows_skipped += 1;
            continue;
        }

        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    tracing::debug!(
        rows = rows.len(),
        skipped = rows_skipped,
        columns = headers.len(),
        "ingested raw table"
    );

    Ok(RawTable {
        headers,
        rows,
        rows_skipped,
    })
}

/// Read a `;`-delimited CSV from a file path
pub fn read_table_from_path(path: &Path) -> Result<RawTable, EngineError> {
    let file = File::open(path)?;
    read_table(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_semicolon_delimited() {
        let csv = "Timestamp;Gazepoint X;Eye event\n100;0.5;Fixation\n200;0.6;Saccade\n";
        let table = read_table(csv.as_bytes()).unwrap();

        assert_eq!(
            table.headers,
            vec!["Timestamp", "Gazepoint X", "Eye event"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["100", "0.5", "Fixation"]);
        assert_eq!(table.rows_skipped, 0);
    }

    #[test]
    fn test_mismatched_field_count_is_skipped() {
        let csv = "a;b;c\n1;2;3\n1;2\n4;5;6;7\n7;8;9\n";
        let table = read_table(csv.as_bytes()).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows_skipped, 2);
        assert_eq!(table.rows[1], vec!["7", "8", "9"]);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            read_table("".as_bytes()),
            Err(EngineError::EmptyInput)
        ));
        assert!(matches!(
            read_table(";;".as_bytes()),
            Err(EngineError::EmptyInput)
        ));
    }

    #[test]
    fn test_header_only_file_yields_zero_rows() {
        let table = read_table("Timestamp;Eye event\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers.len(), 2);
    }

    #[test]
    fn test_cells_are_kept_verbatim() {
        // Whitespace survives ingest; trimming belongs to the sanitizer
        let csv = "a;b\n 1 ; Fixation \n";
        let table = read_table(csv.as_bytes()).unwrap();
        assert_eq!(table.rows[0], vec![" 1 ", " Fixation "]);
    }
}
