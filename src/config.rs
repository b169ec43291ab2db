//! Engine configuration
//!
//! Plain value struct with sensible defaults; the embedding service decides
//! where the values come from (environment, config file, CLI flags).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatcher::DEFAULT_BATCH_SIZE;

/// Default prediction endpoint of the activity classifier
pub const DEFAULT_CLASSIFIER_ENDPOINT: &str = "http://localhost:8080/predict";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prediction endpoint of the remote classifier
    pub classifier_endpoint: String,
    /// Rows per classifier call when an upload does not choose its own
    pub batch_size: usize,
    /// Directory uploads are staged in while their job runs
    pub staging_dir: PathBuf,
    /// Keep a cleaned copy of each upload next to the staged file
    pub persist_cleaned: bool,
    /// Pause between batches, in milliseconds (0 = none)
    pub inter_batch_delay_ms: u64,
    /// Upper bound on concurrently running background jobs
    pub max_concurrent_jobs: usize,
    /// Capacity of the job store
    pub max_jobs: usize,
    /// How long terminal job records stay queryable, in seconds
    pub job_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier_endpoint: DEFAULT_CLASSIFIER_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            staging_dir: PathBuf::from("staging"),
            persist_cleaned: false,
            inter_batch_delay_ms: 0,
            max_concurrent_jobs: 4,
            max_jobs: 256,
            job_ttl_secs: 3600,
        }
    }
}

impl EngineConfig {
    pub fn with_classifier_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.classifier_endpoint = endpoint.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_persist_cleaned(mut self, persist: bool) -> Self {
        self.persist_cleaned = persist;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }
}
