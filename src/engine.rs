//! Engine orchestration
//!
//! The surface an HTTP layer embeds. An upload is schema-checked
//! synchronously (a file with no usable columns is rejected before any
//! background work), then staged to disk, registered in the job store, and
//! processed by a fire-and-forget task: sanitize → rebase → batch dispatch →
//! finalize. The staged file is removed when the task ends, success or not.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::ActivityClassifier;
use crate::config::EngineConfig;
use crate::dispatcher::BatchDispatcher;
use crate::error::EngineError;
use crate::jobs::{JobStore, JobView};
use crate::rebase::TimestampRebaser;
use crate::sanitize::Sanitizer;
use crate::types::{FinalResult, GazeTable};
use crate::{ingest, pipeline, schema};

/// Acceptance receipt returned to the uploader
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub message: String,
    /// Opaque job key to poll the result boundary with
    pub key: String,
}

/// Classification engine: cleaning pipeline plus batched-inference jobs
pub struct Engine {
    config: EngineConfig,
    classifier: Arc<dyn ActivityClassifier>,
    store: JobStore,
    admission: Arc<Semaphore>,
}

impl Engine {
    pub fn new(config: EngineConfig, classifier: Arc<dyn ActivityClassifier>) -> Self {
        let store = JobStore::new(config.max_jobs, config.job_ttl());
        let admission = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config,
            classifier,
            store,
            admission,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Accept one uploaded recording and start classifying it.
    ///
    /// Returns as soon as the upload is staged and schema-checked; batch
    /// processing continues in the background under the returned key. Each
    /// upload gets a fresh random key, so identically-named files never
    /// share state.
    ///
    /// # Errors
    /// Empty input, unreadable CSV, a schema with no canonical columns, and
    /// staging I/O failures are reported here, synchronously. Later failures
    /// only surface through the result boundary.
    pub async fn submit(
        &self,
        original_name: &str,
        contents: &[u8],
        batch_size: Option<usize>,
    ) -> Result<UploadReceipt, EngineError> {
        let batch_size = batch_size.unwrap_or(self.config.batch_size);
        if batch_size == 0 {
            return Err(EngineError::InvalidBatchSize(batch_size));
        }

        let raw = ingest::read_table(contents)?;
        let table = schema::to_canonical(&raw)?;

        let key = Uuid::new_v4().to_string();
        let staged = StagedFile::create(&self.config.staging_dir, &key, original_name, contents)?;
        let cancel = self.store.create(&key).await;

        tracing::info!(
            key = %key,
            file = original_name,
            rows = table.n_rows,
            batch_size,
            "upload accepted"
        );

        let config = self.config.clone();
        let classifier = self.classifier.clone();
        let store = self.store.clone();
        let admission = self.admission.clone();
        let job_key = key.clone();

        tokio::spawn(async move {
            // Staged file lives exactly as long as this task
            let staged = staged;

            let permit = match admission.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    store
                        .finalize(&job_key, Err("engine is shutting down".to_string()))
                        .await;
                    return;
                }
            };

            let outcome = run_job(
                &config,
                classifier,
                &store,
                &job_key,
                batch_size,
                table,
                &staged,
                &cancel,
            )
            .await;
            store.finalize(&job_key, outcome).await;
            drop(permit);
        });

        Ok(UploadReceipt {
            message: "File accepted for classification".to_string(),
            key,
        })
    }

    /// Result boundary: current status and, when terminal, the outcome
    pub async fn result(&self, key: &str) -> Result<JobView, EngineError> {
        self.store.get(key).await
    }

    /// Request cooperative cancellation of a running job
    pub async fn cancel(&self, key: &str) -> Result<(), EngineError> {
        self.store.cancel(key).await
    }
}

/// Everything that can fail after acceptance funnels through this one
/// function, so the task-level catch in `submit` finalizes the job exactly
/// once with either a result or a message.
#[allow(clippy::too_many_arguments)]
async fn run_job(
    config: &EngineConfig,
    classifier: Arc<dyn ActivityClassifier>,
    store: &JobStore,
    key: &str,
    batch_size: usize,
    mut table: GazeTable,
    staged: &StagedFile,
    cancel: &CancellationToken,
) -> Result<FinalResult, String> {
    Sanitizer::sanitize(&mut table);
    TimestampRebaser::rebase(&mut table);

    if config.persist_cleaned {
        let path = staged.cleaned_path();
        // Inspection copy only; never worth failing the job over
        if let Err(error) = pipeline::write_cleaned_csv(&table, &path) {
            tracing::warn!(key, error = %error, "could not persist cleaned copy");
        }
    }

    let dispatcher = BatchDispatcher::new(classifier, batch_size)
        .map_err(|e| e.to_string())?
        .with_inter_batch_delay(config.inter_batch_delay());
    let aggregate = dispatcher.dispatch(&table, store, key, cancel).await;

    if cancel.is_cancelled() {
        return Err("cancelled before completion".to_string());
    }

    aggregate.finalize().ok_or_else(|| {
        format!(
            "no rows scored ({} of {} batches skipped)",
            aggregate.batches_skipped, aggregate.batches_total
        )
    })
}

/// Staged upload on disk, removed when dropped.
///
/// The drop runs whether the job completed, failed, or was cancelled; only
/// the cleaned inspection copy (if requested) outlives the job.
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    fn create(
        dir: &Path,
        key: &str,
        original_name: &str,
        contents: &[u8],
    ) -> Result<Self, EngineError> {
        fs::create_dir_all(dir)?;

        let file_name = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        let path = dir.join(format!("{key}-{file_name}"));
        fs::write(&path, contents)?;

        Ok(Self { path })
    }

    /// Where the cleaned inspection copy goes, next to the staged file
    fn cleaned_path(&self) -> PathBuf {
        self.path.with_extension("cleaned.csv")
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %error, "could not remove staged file");
        }
    }
}
