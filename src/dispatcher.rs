//! Batch dispatch
//!
//! Slices a cleaned table into fixed-size batches, drives the classifier
//! once per batch in row order, and folds successful responses into a
//! weighted running aggregate. One failing batch never fails the job: the
//! batch is logged, counted as skipped, and the loop moves on. The running
//! aggregate is checkpointed into the job store after every batch.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::classifier::{ActivityClassifier, ClassifierError};
use crate::error::EngineError;
use crate::jobs::JobStore;
use crate::types::{Aggregate, ClassifierRequest, ClassifierResponse, GazeTable};

/// Rows per classifier call unless the upload says otherwise
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Drives one job's batches through a classifier
pub struct BatchDispatcher {
    classifier: Arc<dyn ActivityClassifier>,
    batch_size: usize,
    inter_batch_delay: Option<Duration>,
}

impl BatchDispatcher {
    pub fn new(
        classifier: Arc<dyn ActivityClassifier>,
        batch_size: usize,
    ) -> Result<Self, EngineError> {
        if batch_size == 0 {
            return Err(EngineError::InvalidBatchSize(batch_size));
        }
        Ok(Self {
            classifier,
            batch_size,
            inter_batch_delay: None,
        })
    }

    /// Pause between batches, yielding the task so other jobs interleave
    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = (delay > Duration::ZERO).then_some(delay);
        self
    }

    /// Process every batch of `table` in row order and return the aggregate.
    ///
    /// Stops early when `cancel` trips; the caller decides what a partial
    /// aggregate means. Never returns an error: per-batch failures are
    /// absorbed into the skip count.
    pub async fn dispatch(
        &self,
        table: &GazeTable,
        store: &JobStore,
        key: &str,
        cancel: &CancellationToken,
    ) -> Aggregate {
        let mut aggregate = Aggregate::default();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < table.n_rows {
            if cancel.is_cancelled() {
                tracing::info!(key, batch = index, "cancelled, stopping batch loop");
                break;
            }

            let end = usize::min(start + self.batch_size, table.n_rows);
            let request = build_request(table, start..end);

            match self.classify_batch(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        key,
                        batch = index,
                        rows = end - start,
                        scored = response.process_data,
                        "batch scored"
                    );
                    aggregate.absorb(&response);
                }
                Err(error) => {
                    tracing::warn!(
                        key,
                        batch = index,
                        rows = end - start,
                        error = %error,
                        "batch failed, skipping"
                    );
                    aggregate.record_skip();
                }
            }

            store.update(key, &aggregate).await;
            start = end;
            index += 1;

            if let Some(delay) = self.inter_batch_delay {
                if start < table.n_rows {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        aggregate
    }

    async fn classify_batch(
        &self,
        request: &ClassifierRequest,
    ) -> Result<ClassifierResponse, ClassifierError> {
        validate_request(request)?;
        self.classifier.classify(request).await
    }
}

/// Materialize one row range as the six-array wire payload.
///
/// The wire contract always carries six arrays. A pupil column the sanitizer
/// dropped (or that the recording never had) rides as zeros, the same
/// sensor-absent signal the all-zero input column carried.
pub fn build_request(table: &GazeTable, range: Range<usize>) -> ClassifierRequest {
    let rows = range.len();
    let numeric =
        |col: &Option<Vec<f64>>| col.as_ref().map(|c| c[range.clone()].to_vec()).unwrap_or_default();
    let pupil = |col: &Option<Vec<f64>>| {
        col.as_ref()
            .map(|c| c[range.clone()].to_vec())
            .unwrap_or_else(|| vec![0.0; rows])
    };

    ClassifierRequest {
        timestamp: numeric(&table.timestamp),
        gazepoint_x: numeric(&table.gazepoint_x),
        gazepoint_y: numeric(&table.gazepoint_y),
        pupil_area_right_sq_mm: pupil(&table.pupil_area_right_sq_mm),
        pupil_area_left_sq_mm: pupil(&table.pupil_area_left_sq_mm),
        eye_event: table
            .eye_event
            .as_ref()
            .map(|c| c[range.clone()].to_vec())
            .unwrap_or_default(),
    }
}

/// Pre-dispatch check: every required field present and non-empty
fn validate_request(request: &ClassifierRequest) -> Result<(), ClassifierError> {
    let fields = [
        ("timestamp", request.timestamp.len()),
        ("gazepoint_x", request.gazepoint_x.len()),
        ("gazepoint_y", request.gazepoint_y.len()),
        ("pupil_area_right_sq_mm", request.pupil_area_right_sq_mm.len()),
        ("pupil_area_left_sq_mm", request.pupil_area_left_sq_mm.len()),
        ("eye_event", request.eye_event.len()),
    ];
    for (field, len) in fields {
        if len == 0 {
            return Err(ClassifierError::InvalidPayload(format!(
                "required field {field} is empty"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Activity;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted classifier double: pops one canned outcome per call and
    /// records every request it receives.
    struct FakeClassifier {
        responses: Mutex<VecDeque<Result<ClassifierResponse, ClassifierError>>>,
        requests: Mutex<Vec<ClassifierRequest>>,
    }

    impl FakeClassifier {
        fn scripted(
            outcomes: Vec<Result<ClassifierResponse, ClassifierError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_lens(&self) -> Vec<usize> {
            self.requests.lock().unwrap().iter().map(|r| r.len()).collect()
        }
    }

    #[async_trait]
    impl ActivityClassifier for FakeClassifier {
        async fn classify(
            &self,
            request: &ClassifierRequest,
        ) -> Result<ClassifierResponse, ClassifierError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClassifierError::Network("script exhausted".to_string())))
        }
    }

    fn response(walking: f64, playing: f64, reading: f64, process_data: u64) -> ClassifierResponse {
        ClassifierResponse {
            walking,
            playing,
            reading,
            process_data,
        }
    }

    fn table(n_rows: usize) -> GazeTable {
        GazeTable {
            n_rows,
            timestamp: Some(vec![1.0; n_rows]),
            gazepoint_x: Some(vec![0.5; n_rows]),
            gazepoint_y: Some(vec![0.5; n_rows]),
            pupil_area_right_sq_mm: Some(vec![0.4; n_rows]),
            pupil_area_left_sq_mm: Some(vec![0.6; n_rows]),
            eye_event: Some(vec!["Fixation".to_string(); n_rows]),
            flags: Vec::new(),
        }
    }

    fn store() -> JobStore {
        JobStore::new(16, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_1200_rows_dispatch_as_three_batches() {
        let classifier = FakeClassifier::scripted(vec![
            Ok(response(0.6, 0.3, 0.1, 500)),
            Ok(response(0.6, 0.3, 0.1, 500)),
            Ok(response(0.2, 0.2, 0.6, 200)),
        ]);
        let dispatcher = BatchDispatcher::new(classifier.clone(), 500).unwrap();
        let store = store();
        let cancel = store.create("job").await;

        let aggregate = dispatcher.dispatch(&table(1200), &store, "job", &cancel).await;

        assert_eq!(classifier.request_lens(), vec![500, 500, 200]);
        let result = aggregate.finalize().unwrap();
        assert!((result.walking - 640.0 / 1200.0).abs() < 1e-9);
        assert!((result.playing - 340.0 / 1200.0).abs() < 1e-9);
        assert!((result.reading - 220.0 / 1200.0).abs() < 1e-9);
        assert_eq!(result.final_activity, Activity::Walking);
    }

    #[tokio::test]
    async fn test_failed_batch_is_skipped_not_fatal() {
        let classifier = FakeClassifier::scripted(vec![
            Ok(response(0.9, 0.05, 0.05, 10)),
            Err(ClassifierError::Status(503, "overloaded".to_string())),
            Ok(response(0.9, 0.05, 0.05, 10)),
        ]);
        let dispatcher = BatchDispatcher::new(classifier, 10).unwrap();
        let store = store();
        let cancel = store.create("job").await;

        let aggregate = dispatcher.dispatch(&table(30), &store, "job", &cancel).await;

        assert_eq!(aggregate.batches_total, 3);
        assert_eq!(aggregate.batches_skipped, 1);
        assert_eq!(aggregate.process_data, 20);
    }

    #[tokio::test]
    async fn test_all_batches_failing_leaves_nothing_to_finalize() {
        let classifier = FakeClassifier::scripted(vec![
            Err(ClassifierError::Network("down".to_string())),
            Err(ClassifierError::Network("down".to_string())),
        ]);
        let dispatcher = BatchDispatcher::new(classifier, 10).unwrap();
        let store = store();
        let cancel = store.create("job").await;

        let aggregate = dispatcher.dispatch(&table(20), &store, "job", &cancel).await;

        assert_eq!(aggregate.process_data, 0);
        assert_eq!(aggregate.batches_skipped, 2);
        assert_eq!(aggregate.finalize(), None);
    }

    #[tokio::test]
    async fn test_invalid_payload_skips_without_calling_classifier() {
        let classifier = FakeClassifier::scripted(vec![Ok(response(0.5, 0.3, 0.2, 10))]);
        let dispatcher = BatchDispatcher::new(classifier.clone(), 10).unwrap();
        let store = store();
        let cancel = store.create("job").await;

        let mut no_timestamps = table(10);
        no_timestamps.timestamp = None;
        let aggregate = dispatcher
            .dispatch(&no_timestamps, &store, "job", &cancel)
            .await;

        assert!(classifier.request_lens().is_empty());
        assert_eq!(aggregate.batches_skipped, 1);
    }

    #[tokio::test]
    async fn test_dropped_pupil_column_rides_as_zeros() {
        let classifier = FakeClassifier::scripted(vec![Ok(response(0.5, 0.3, 0.2, 5))]);
        let dispatcher = BatchDispatcher::new(classifier.clone(), 10).unwrap();
        let store = store();
        let cancel = store.create("job").await;

        let mut no_left_pupil = table(5);
        no_left_pupil.pupil_area_left_sq_mm = None;
        dispatcher
            .dispatch(&no_left_pupil, &store, "job", &cancel)
            .await;

        let requests = classifier.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].pupil_area_left_sq_mm, vec![0.0; 5]);
        assert_eq!(requests[0].pupil_area_right_sq_mm, vec![0.4; 5]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_loop_between_batches() {
        let classifier = FakeClassifier::scripted(vec![]);
        let dispatcher = BatchDispatcher::new(classifier.clone(), 10).unwrap();
        let store = store();
        let cancel = store.create("job").await;
        cancel.cancel();

        let aggregate = dispatcher.dispatch(&table(30), &store, "job", &cancel).await;

        assert!(classifier.request_lens().is_empty());
        assert_eq!(aggregate.batches_total, 0);
    }

    #[tokio::test]
    async fn test_aggregate_is_checkpointed_into_the_store() {
        let classifier = FakeClassifier::scripted(vec![
            Ok(response(0.5, 0.3, 0.2, 10)),
            Ok(response(0.5, 0.3, 0.2, 10)),
        ]);
        let dispatcher = BatchDispatcher::new(classifier, 10).unwrap();
        let store = store();
        let cancel = store.create("job").await;

        dispatcher.dispatch(&table(20), &store, "job", &cancel).await;

        let record = store.snapshot("job").await.unwrap();
        assert_eq!(record.aggregate.batches_total, 2);
        assert_eq!(record.aggregate.process_data, 20);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let classifier = FakeClassifier::scripted(vec![]);
        assert!(matches!(
            BatchDispatcher::new(classifier, 0),
            Err(EngineError::InvalidBatchSize(0))
        ));
    }

    #[test]
    fn test_validation_names_the_empty_field() {
        let request = build_request(&table(0), 0..0);
        match validate_request(&request) {
            Err(ClassifierError::InvalidPayload(message)) => {
                assert!(message.contains("timestamp"));
            }
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }
}
