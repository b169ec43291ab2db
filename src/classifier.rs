//! Classifier boundary
//!
//! The activity classifier is an opaque remote service: it accepts one batch
//! of cleaned rows as six parallel JSON arrays and returns per-class scores
//! plus the number of rows it actually scored. This module defines the trait
//! the dispatcher drives and the HTTP implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ClassifierRequest, ClassifierResponse};

const USER_AGENT: &str = concat!("seetrue-engine/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Classifier call errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Classifier answered with a non-2xx status
    #[error("Classifier error {0}: {1}")]
    Status(u16, String),

    /// Response body did not match the expected shape
    #[error("Failed to parse classifier response: {0}")]
    Parse(String),

    /// Batch payload failed pre-dispatch validation
    #[error("Invalid batch payload: {0}")]
    InvalidPayload(String),
}

/// Anything that can score a batch of cleaned gaze rows
#[async_trait]
pub trait ActivityClassifier: Send + Sync {
    async fn classify(
        &self,
        request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, ClassifierError>;
}

/// HTTP classifier client
pub struct HttpClassifier {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpClassifier {
    /// Create a client for the given prediction endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ActivityClassifier for HttpClassifier {
    async fn classify(
        &self,
        request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, ClassifierError> {
        tracing::debug!(endpoint = %self.endpoint, rows = request.len(), "dispatching batch");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status(
                status.as_u16(),
                body.chars().take(200).collect(),
            ));
        }

        response
            .json::<ClassifierResponse>()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))
    }
}
