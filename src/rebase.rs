//! Temporal rebasing
//!
//! Collapses an absolute millisecond timestamp series into a bounded,
//! repeating cycle: rows are grouped into 9-second chunks, and each row's
//! timestamp becomes its integer offset from the chunk's earliest sample,
//! starting at 1 and wrapping at 9. The chunk index is only a grouping key
//! and is not retained.

use std::collections::HashMap;

use crate::types::GazeTable;

/// Width of the grouping window, in seconds
pub const CHUNK_SECONDS: f64 = 9.0;

/// Rebaser for canonical gaze tables
pub struct TimestampRebaser;

impl TimestampRebaser {
    /// Rewrite the timestamp column in place; a no-op when it is absent
    pub fn rebase(table: &mut GazeTable) {
        if let Some(col) = table.timestamp.as_mut() {
            rebase_series(col);
            tracing::debug!(rows = col.len(), "rebased timestamps onto 9-second cycle");
        }
    }
}

/// Rebase one millisecond series to within-chunk cycle positions in [1, 9]
fn rebase_series(col: &mut [f64]) {
    let seconds: Vec<f64> = col.iter().map(|ms| ms / 1000.0).collect();

    let mut chunk_min: HashMap<i64, f64> = HashMap::new();
    for &s in &seconds {
        chunk_min
            .entry(chunk_index(s))
            .and_modify(|min| {
                if s < *min {
                    *min = s;
                }
            })
            .or_insert(s);
    }

    for (value, &s) in col.iter_mut().zip(&seconds) {
        let min = chunk_min[&chunk_index(s)];
        *value = (((s - min) % CHUNK_SECONDS) + 1.0).trunc();
    }
}

fn chunk_index(seconds: f64) -> i64 {
    (seconds / CHUNK_SECONDS).floor() as i64
}
