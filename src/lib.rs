//! SeeTrue Engine - cleaning and batched-inference engine for eye-tracking
//! activity classification
//!
//! The engine turns a raw eye-tracker CSV export into a canonical numeric
//! table through a deterministic pipeline: schema mapping → value
//! sanitization → temporal rebasing. It then drives a remote activity
//! classifier over the cleaned rows in fixed-size batches and folds the
//! per-batch scores into one weighted prediction for the whole session.
//!
//! ## Modules
//!
//! - **Cleaning pipeline**: [`ingest`], [`schema`], [`sanitize`], [`rebase`],
//!   orchestrated by [`pipeline`]
//! - **Inference**: [`classifier`] (the remote boundary), [`dispatcher`]
//!   (batching, aggregation, failure tolerance)
//! - **Job tracking**: [`jobs`] (keyed status store), [`engine`] (uploads,
//!   background tasks, staging)

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod pipeline;
pub mod rebase;
pub mod sanitize;
pub mod schema;
pub mod types;

pub use classifier::{ActivityClassifier, ClassifierError, HttpClassifier};
pub use config::EngineConfig;
pub use dispatcher::{BatchDispatcher, DEFAULT_BATCH_SIZE};
pub use engine::{Engine, UploadReceipt};
pub use error::EngineError;
pub use jobs::{JobStatus, JobStore, JobView};
pub use pipeline::{clean_file, clean_reader, write_cleaned_csv};
pub use types::{
    Activity, Aggregate, ClassifierRequest, ClassifierResponse, FinalResult, GazeTable,
};

/// Engine version embedded in logs and the CLI
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
