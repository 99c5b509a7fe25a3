//! Upload coordinator: one batch at a time, all tasks in flight together.
//!
//! The coordinator owns the `Idle -> Uploading -> Idle` lifecycle. A batch
//! dispatches one transport call per task, joins over all of them on the
//! calling task, and only then delivers results. Per-task failures are
//! contained: they never abort siblings and surface as an absence from the
//! success delivery (and as an entry in [`BatchReport::failed`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use dropzone_transfer::{Rejection, UploadConstraints, UploadFile, UploadResult, validate_candidates};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::batch::{BatchState, FailedUpload};
use crate::error::BatchError;
use crate::observer::{BatchEvent, TracingObserver, UploadObserver};
use crate::transport::{MockResultFn, ProgressFn, UploadOptions, UploadTransport};

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Uploading,
}

/// What a presentation layer needs to render upload feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSnapshot {
    pub is_uploading: bool,
    pub aggregate_progress: u8,
}

/// Shape of a delivery: a single item when the batch is single-file,
/// a sequence otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    Single(Option<T>),
    Multiple(Vec<T>),
}

impl<T> Delivery<T> {
    /// Wraps `items`; single mode keeps only the first one.
    pub fn from_vec(items: Vec<T>, is_multi: bool) -> Self {
        if is_multi {
            Delivery::Multiple(items)
        } else {
            Delivery::Single(items.into_iter().next())
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Delivery::Single(item) => item.into_iter().collect(),
            Delivery::Multiple(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Delivery::Single(item) => usize::from(item.is_some()),
            Delivery::Multiple(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receives the outcome of a batch. Each method is called at most once per
/// batch, after every task has settled.
pub trait BatchCallbacks: Send + Sync {
    fn on_success(&self, _results: Delivery<UploadResult>) {}

    fn on_reject(&self, _rejected: Delivery<Rejection>) {}
}

/// Per-batch options.
#[derive(Clone)]
pub struct BatchOptions {
    /// Upload every candidate (`true`) or only the first.
    pub is_multi: bool,
    /// Upstream validation rejections, delivered unchanged.
    pub rejected: Vec<Rejection>,
    /// Generates the mock result forwarded to the transport per task.
    pub mock_result_generator: Option<MockResultFn>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            is_multi: true,
            rejected: Vec::new(),
            mock_result_generator: None,
        }
    }
}

impl BatchOptions {
    pub fn new(is_multi: bool) -> Self {
        Self {
            is_multi,
            ..Self::default()
        }
    }

    pub fn with_rejected(mut self, rejected: Vec<Rejection>) -> Self {
        self.rejected = rejected;
        self
    }

    pub fn with_mock_results(mut self, generator: MockResultFn) -> Self {
        self.mock_result_generator = Some(generator);
        self
    }
}

impl std::fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOptions")
            .field("is_multi", &self.is_multi)
            .field("rejected", &self.rejected.len())
            .field("mock_results", &self.mock_result_generator.is_some())
            .finish()
    }
}

/// Full outcome of a batch: succeeded, failed in transit, rejected upstream.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: u64,
    pub succeeded: Vec<UploadResult>,
    pub failed: Vec<FailedUpload>,
    pub rejected: Vec<Rejection>,
    /// Aggregate progress when the last task settled.
    pub aggregate_progress: u8,
}

type SharedBatch = Arc<Mutex<Option<BatchState>>>;

fn lock(batch: &SharedBatch) -> MutexGuard<'_, Option<BatchState>> {
    batch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the filled batch slot for the duration of one `start_batch` call.
///
/// If the call is dropped before every task settles, the slot is cleared so
/// the coordinator returns to `Idle`.
struct SlotGuard {
    batch: SharedBatch,
    batch_id: u64,
    armed: bool,
}

impl SlotGuard {
    fn new(batch: &SharedBatch, batch_id: u64) -> Self {
        Self {
            batch: Arc::clone(batch),
            batch_id,
            armed: true,
        }
    }

    /// Takes the settled batch out of the slot.
    fn finish(mut self) -> Option<BatchState> {
        self.armed = false;
        self.clear()
    }

    fn clear(&self) -> Option<BatchState> {
        let mut guard = lock(&self.batch);
        match guard.as_ref() {
            Some(state) if state.id() == self.batch_id => guard.take(),
            _ => None,
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.armed && self.clear().is_some() {
            warn!(batch = self.batch_id, "batch dropped before settling, slot released");
        }
    }
}

/// Coordinates batch uploads over a transport.
pub struct UploadCoordinator {
    transport: Arc<dyn UploadTransport>,
    observer: Arc<dyn UploadObserver>,
    batch: SharedBatch,
    next_batch_id: AtomicU64,
}

impl UploadCoordinator {
    /// Creates a coordinator that logs events through `tracing`.
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            observer: Arc::new(TracingObserver),
            batch: Arc::new(Mutex::new(None)),
            next_batch_id: AtomicU64::new(1),
        }
    }

    /// Replaces the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        if lock(&self.batch).is_some() {
            CoordinatorState::Uploading
        } else {
            CoordinatorState::Idle
        }
    }

    /// Truncated mean of the current batch's task progress, 0 when idle.
    pub fn aggregate_progress(&self) -> u8 {
        lock(&self.batch)
            .as_ref()
            .map_or(0, BatchState::aggregate_progress)
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        let guard = lock(&self.batch);
        UploadSnapshot {
            is_uploading: guard.is_some(),
            aggregate_progress: guard.as_ref().map_or(0, BatchState::aggregate_progress),
        }
    }

    /// Validates raw candidates and uploads the accepted ones.
    ///
    /// When nothing passes validation, only `on_reject` is called and no
    /// batch starts.
    pub async fn drop_files(
        &self,
        files: Vec<UploadFile>,
        constraints: &UploadConstraints,
        mut options: BatchOptions,
        callbacks: &dyn BatchCallbacks,
    ) -> Result<Option<BatchReport>, BatchError> {
        let validated = validate_candidates(files, constraints);
        options.is_multi = constraints.is_multi;
        options.rejected.extend(validated.rejected);

        if validated.accepted.is_empty() {
            if !options.rejected.is_empty() {
                debug!(rejected = options.rejected.len(), "no file passed validation");
                callbacks.on_reject(Delivery::from_vec(options.rejected, options.is_multi));
            }
            return Ok(None);
        }

        self.start_batch(validated.accepted, options, callbacks).await
    }

    /// Uploads `candidates` concurrently and delivers the results.
    ///
    /// Returns `Ok(None)` without touching any state when `candidates` is
    /// empty, and [`BatchError::BatchInProgress`] when another batch is
    /// still running.
    pub async fn start_batch(
        &self,
        candidates: Vec<UploadFile>,
        options: BatchOptions,
        callbacks: &dyn BatchCallbacks,
    ) -> Result<Option<BatchReport>, BatchError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let batch_id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
        let files = {
            let mut guard = lock(&self.batch);
            if guard.is_some() {
                return Err(BatchError::BatchInProgress);
            }
            let mut state = BatchState::new(batch_id, candidates, options.is_multi);
            state.start_all();
            let files: Vec<UploadFile> = state.tasks().iter().map(|t| t.file.clone()).collect();
            *guard = Some(state);
            files
        };
        let slot = SlotGuard::new(&self.batch, batch_id);

        self.observer.on_event(&BatchEvent::Started {
            batch: batch_id,
            files: files.iter().map(|f| f.name.clone()).collect(),
        });

        let uploads = files.into_iter().enumerate().map(|(index, file)| {
            let mut upload_options = UploadOptions::new(self.progress_fn(batch_id, index));
            upload_options.mock_result = options
                .mock_result_generator
                .as_ref()
                .map(|generate| generate(index));

            async move {
                let outcome = self
                    .transport
                    .upload(&file, upload_options)
                    .await
                    .map_err(|e| e.to_string());
                self.settle(batch_id, index, outcome);
            }
        });
        join_all(uploads).await;

        let Some(state) = slot.finish() else {
            return Ok(None);
        };

        let report = BatchReport {
            batch_id,
            succeeded: state.succeeded(),
            failed: state.failed(),
            rejected: options.rejected,
            aggregate_progress: state.aggregate_progress(),
        };

        self.observer.on_event(&BatchEvent::Finished {
            batch: batch_id,
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
            rejected: report.rejected.len(),
            aggregate: report.aggregate_progress,
        });

        callbacks.on_success(Delivery::from_vec(report.succeeded.clone(), state.is_multi()));
        callbacks.on_reject(Delivery::from_vec(report.rejected.clone(), state.is_multi()));

        Ok(Some(report))
    }

    /// Builds the progress callback for task `index` of batch `batch_id`.
    fn progress_fn(&self, batch_id: u64, index: usize) -> ProgressFn {
        let batch = Arc::clone(&self.batch);
        let observer = Arc::clone(&self.observer);

        Arc::new(move |progress: u8| {
            let mut guard = lock(&batch);
            let aggregate = match guard.as_mut() {
                Some(state) if state.id() == batch_id => state.update_progress(index, progress),
                _ => None,
            };
            // Emitted under the lock so observers see aggregates in update order.
            if let Some(aggregate) = aggregate {
                observer.on_event(&BatchEvent::Progress {
                    batch: batch_id,
                    index,
                    progress: progress.min(dropzone_transfer::MAX_PROGRESS),
                    aggregate,
                });
            }
        })
    }

    fn settle(&self, batch_id: u64, index: usize, outcome: Result<UploadResult, String>) {
        let event = match &outcome {
            Ok(result) => BatchEvent::TaskSucceeded {
                batch: batch_id,
                index,
                result: result.clone(),
            },
            Err(error) => BatchEvent::TaskFailed {
                batch: batch_id,
                index,
                error: error.clone(),
            },
        };

        let settled = {
            let mut guard = lock(&self.batch);
            match guard.as_mut() {
                Some(state) if state.id() == batch_id => state.settle(index, outcome),
                _ => false,
            }
        };
        if settled {
            self.observer.on_event(&event);
        }
    }
}
