//! Job store
//!
//! Process-wide map from job key to job record. A job is created when an
//! upload is accepted, checkpointed by the batch dispatcher after every
//! batch, and finalized exactly once into `complete` or `error`. The store
//! is bounded: terminal records expire after a TTL and the oldest terminal
//! records are evicted when the map outgrows its capacity. In-flight jobs
//! are never evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::types::{Aggregate, FinalResult};

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// One tracked classification job
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub key: String,
    pub status: JobStatus,
    /// Running totals, updated once per dispatched batch
    pub aggregate: Aggregate,
    pub result: Option<FinalResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl JobRecord {
    fn new(key: &str) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            status: JobStatus::Processing,
            aggregate: Aggregate::default(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            cancel: CancellationToken::new(),
        }
    }
}

/// Status plus result view, as served to the result boundary.
///
/// `final_result` is `{}` while processing, the prediction when complete,
/// and `{"error": ...}` when the job failed.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub status: JobStatus,
    pub final_result: serde_json::Value,
}

/// Bounded, TTL-evicting store of job records
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<String, JobRecord>>>,
    max_jobs: usize,
    job_ttl: chrono::Duration,
}

impl JobStore {
    pub fn new(max_jobs: usize, job_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            max_jobs,
            job_ttl: chrono::Duration::from_std(job_ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Register a new `processing` job with a zeroed aggregate, overwriting
    /// any prior record under the same key. Returns the job's cancellation
    /// token for the task that will run it.
    pub async fn create(&self, key: &str) -> CancellationToken {
        let mut map = self.inner.write().await;
        self.evict(&mut map);

        let record = JobRecord::new(key);
        let token = record.cancel.clone();
        if map.insert(key.to_string(), record).is_some() {
            tracing::warn!(key, "overwrote existing job record");
        }
        tracing::info!(key, "job registered");
        token
    }

    /// Checkpoint the running aggregate for an in-flight job
    pub async fn update(&self, key: &str, aggregate: &Aggregate) {
        let mut map = self.inner.write().await;
        match map.get_mut(key) {
            Some(record) if record.status == JobStatus::Processing => {
                record.aggregate = aggregate.clone();
                record.updated_at = Utc::now();
            }
            Some(_) => tracing::warn!(key, "ignoring update to terminal job"),
            None => tracing::warn!(key, "ignoring update to unknown job"),
        }
    }

    /// Transition a job to its terminal state, exactly once
    pub async fn finalize(&self, key: &str, outcome: Result<FinalResult, String>) {
        let mut map = self.inner.write().await;
        let Some(record) = map.get_mut(key) else {
            tracing::warn!(key, "ignoring finalize of unknown job");
            return;
        };
        if record.status.is_terminal() {
            tracing::warn!(key, "ignoring second finalize");
            return;
        }

        record.updated_at = Utc::now();
        match outcome {
            Ok(result) => {
                tracing::info!(key, activity = result.final_activity.as_str(), "job complete");
                record.status = JobStatus::Complete;
                record.result = Some(result);
            }
            Err(message) => {
                tracing::error!(key, error = %message, "job failed");
                record.status = JobStatus::Error;
                record.error = Some(message);
            }
        }
    }

    /// Current status and result view for a job
    pub async fn get(&self, key: &str) -> Result<JobView, EngineError> {
        let map = self.inner.read().await;
        let record = map
            .get(key)
            .ok_or_else(|| EngineError::JobNotFound(key.to_string()))?;

        let final_result = match record.status {
            JobStatus::Processing => serde_json::json!({}),
            JobStatus::Complete => serde_json::to_value(&record.result)
                .unwrap_or_else(|_| serde_json::json!({})),
            JobStatus::Error => serde_json::json!({
                "error": record.error.clone().unwrap_or_default(),
            }),
        };

        Ok(JobView {
            status: record.status,
            final_result,
        })
    }

    /// Trip a job's cancellation token; the batch loop notices between batches
    pub async fn cancel(&self, key: &str) -> Result<(), EngineError> {
        let map = self.inner.read().await;
        let record = map
            .get(key)
            .ok_or_else(|| EngineError::JobNotFound(key.to_string()))?;
        tracing::info!(key, "cancellation requested");
        record.cancel.cancel();
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Full record snapshot, for diagnostics and progress displays
    pub async fn snapshot(&self, key: &str) -> Option<JobRecord> {
        self.inner.read().await.get(key).cloned()
    }

    /// Drop expired terminal records, then oldest terminal records while over
    /// capacity. In-flight jobs always survive.
    fn evict(&self, map: &mut HashMap<String, JobRecord>) {
        if let Some(deadline) = Utc::now().checked_sub_signed(self.job_ttl) {
            let expired: Vec<String> = map
                .values()
                .filter(|r| r.status.is_terminal() && r.updated_at < deadline)
                .map(|r| r.key.clone())
                .collect();
            for key in expired {
                tracing::debug!(key = %key, "evicting expired job record");
                map.remove(&key);
            }
        }

        while map.len() >= self.max_jobs {
            let Some(oldest) = map
                .values()
                .filter(|r| r.status.is_terminal())
                .min_by_key(|r| r.updated_at)
                .map(|r| r.key.clone())
            else {
                break;
            };
            tracing::debug!(key = %oldest, "evicting job record over capacity");
            map.remove(&oldest);
        }
    }
}
