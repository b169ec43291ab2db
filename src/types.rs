//! Core types for the SeeTrue pipeline
//!
//! This module defines the data structures that flow through each stage:
//! the canonical gaze table produced by cleaning, the classifier wire types,
//! and the running aggregate that becomes the final session prediction.

use serde::{Deserialize, Serialize};

/// Activity classes the remote classifier can predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Walking,
    Playing,
    Reading,
}

impl Activity {
    /// All classes, in tie-breaking order (first listed wins a tie)
    pub const ALL: [Activity; 3] = [Activity::Walking, Activity::Playing, Activity::Reading];

    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Walking => "walking",
            Activity::Playing => "playing",
            Activity::Reading => "reading",
        }
    }
}

/// Things the cleaning pass did to the data beyond plain value transforms.
///
/// Collected per table so callers can tell a lightly-touched recording from a
/// heavily-repaired one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CleaningFlag {
    /// Rows discarded before cleaning (malformed line or unparseable numeric cell)
    RowsDiscarded { count: usize },
    /// A column removed entirely because every value was zero
    DroppedAllZeroColumn { column: String },
    /// Values clamped down to the outlier ceiling
    OutliersCapped { column: String, count: usize },
    /// Min-max rescaling skipped because the column is constant
    RescaleSkippedConstant { column: String },
}

/// Canonical, columnar view of one cleaned (or cleaning-in-progress) recording.
///
/// Column retention is decided once for the whole table: a column is either
/// present for every row or absent entirely. All present columns hold exactly
/// `n_rows` values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeTable {
    /// Row count shared by every present column
    pub n_rows: usize,
    /// Sample timestamp: milliseconds on input, a 1..=9 cycle position after rebasing
    pub timestamp: Option<Vec<f64>>,
    pub gazepoint_x: Option<Vec<f64>>,
    pub gazepoint_y: Option<Vec<f64>>,
    pub pupil_area_right_sq_mm: Option<Vec<f64>>,
    pub pupil_area_left_sq_mm: Option<Vec<f64>>,
    /// Categorical eye event label; `"NA"` where the recording had none
    pub eye_event: Option<Vec<String>>,
    /// What the cleaning pass changed, beyond plain value transforms
    pub flags: Vec<CleaningFlag>,
}

impl GazeTable {
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Names of the columns this table retained, in canonical order
    pub fn retained_columns(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.timestamp.is_some() {
            names.push(crate::schema::COL_TIMESTAMP);
        }
        if self.gazepoint_x.is_some() {
            names.push(crate::schema::COL_GAZEPOINT_X);
        }
        if self.gazepoint_y.is_some() {
            names.push(crate::schema::COL_GAZEPOINT_Y);
        }
        if self.pupil_area_right_sq_mm.is_some() {
            names.push(crate::schema::COL_PUPIL_RIGHT);
        }
        if self.pupil_area_left_sq_mm.is_some() {
            names.push(crate::schema::COL_PUPIL_LEFT);
        }
        if self.eye_event.is_some() {
            names.push(crate::schema::COL_EYE_EVENT);
        }
        names
    }
}

/// One batch of cleaned rows, as the classifier expects it: six parallel
/// arrays of equal length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRequest {
    pub timestamp: Vec<f64>,
    pub gazepoint_x: Vec<f64>,
    pub gazepoint_y: Vec<f64>,
    pub pupil_area_right_sq_mm: Vec<f64>,
    pub pupil_area_left_sq_mm: Vec<f64>,
    pub eye_event: Vec<String>,
}

impl ClassifierRequest {
    /// Number of rows in the batch (length of the timestamp array)
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }
}

/// Per-batch scores returned by the classifier.
///
/// The three scores are not required to sum to 1; only the finalized
/// aggregate is normalized. `process_data` is the number of rows the
/// classifier actually scored and is the batch's aggregation weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResponse {
    pub walking: f64,
    pub playing: f64,
    pub reading: f64,
    pub process_data: u64,
}

/// Running, weight-summed state for one job.
///
/// Each successful batch contributes `score * process_data` per class; the
/// weighted means fall out at finalization. Skipped batches contribute
/// nothing but are counted so the terminal result can report degradation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub walking: f64,
    pub playing: f64,
    pub reading: f64,
    /// Total rows scored across all absorbed batches
    pub process_data: u64,
    pub batches_total: usize,
    pub batches_skipped: usize,
}

impl Aggregate {
    /// Fold one successful batch response into the running sums
    pub fn absorb(&mut self, response: &ClassifierResponse) {
        let weight = response.process_data as f64;
        self.walking += response.walking * weight;
        self.playing += response.playing * weight;
        self.reading += response.reading * weight;
        self.process_data += response.process_data;
        self.batches_total += 1;
    }

    /// Count a batch that failed dispatch or validation
    pub fn record_skip(&mut self) {
        self.batches_total += 1;
        self.batches_skipped += 1;
    }

    /// Collapse the running sums into the session prediction.
    ///
    /// Returns `None` when no rows were scored at all: there is nothing to
    /// divide by, and a zeroed result would read as a real prediction.
    pub fn finalize(&self) -> Option<FinalResult> {
        if self.process_data == 0 {
            return None;
        }

        let weight = self.process_data as f64;
        let mut walking = self.walking / weight;
        let mut playing = self.playing / weight;
        let mut reading = self.reading / weight;

        // Renormalize to sum 1 unless the model scored everything zero
        let total = walking + playing + reading;
        if total > 0.0 {
            walking /= total;
            playing /= total;
            reading /= total;
        }

        let mut final_activity = Activity::Walking;
        let mut best = walking;
        for (activity, value) in [(Activity::Playing, playing), (Activity::Reading, reading)] {
            if value > best {
                final_activity = activity;
                best = value;
            }
        }

        Some(FinalResult {
            walking,
            playing,
            reading,
            final_activity,
            batches_total: self.batches_total,
            batches_skipped: self.batches_skipped,
        })
    }
}

/// Terminal prediction for a whole recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub walking: f64,
    pub playing: f64,
    pub reading: f64,
    /// Class with the strictly greatest probability (ties: walking, playing, reading)
    pub final_activity: Activity,
    pub batches_total: usize,
    /// Batches whose contribution is missing from the probabilities above
    pub batches_skipped: usize,
}
