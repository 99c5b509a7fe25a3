//! Injectable observers for batch lifecycle events.

use dropzone_transfer::UploadResult;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle event emitted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Tasks were created and dispatched.
    Started { batch: u64, files: Vec<String> },
    /// A task reported progress; `aggregate` is the recomputed batch value.
    Progress {
        batch: u64,
        index: usize,
        progress: u8,
        aggregate: u8,
    },
    TaskSucceeded {
        batch: u64,
        index: usize,
        result: UploadResult,
    },
    TaskFailed {
        batch: u64,
        index: usize,
        error: String,
    },
    /// Every task settled; results are about to be delivered.
    Finished {
        batch: u64,
        succeeded: usize,
        failed: usize,
        rejected: usize,
        aggregate: u8,
    },
}

/// Receives batch events. Called synchronously from the coordinator, so
/// implementations must not block.
///
/// `Progress` events are delivered while the batch lock is held, in the order
/// the updates were applied. An observer must not call back into the
/// coordinator from `on_event`.
pub trait UploadObserver: Send + Sync {
    fn on_event(&self, event: &BatchEvent);
}

/// Writes every event to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl UploadObserver for TracingObserver {
    fn on_event(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Started { batch, files } => {
                info!(batch, files = files.len(), "upload batch started");
            }
            BatchEvent::Progress {
                batch,
                index,
                progress,
                aggregate,
            } => {
                debug!(batch, index, progress, aggregate, "upload progress");
            }
            BatchEvent::TaskSucceeded {
                batch,
                index,
                result,
            } => {
                info!(batch, index, url = %result.url, "file uploaded");
            }
            BatchEvent::TaskFailed {
                batch,
                index,
                error,
            } => {
                warn!(batch, index, %error, "file upload failed");
            }
            BatchEvent::Finished {
                batch,
                succeeded,
                failed,
                rejected,
                aggregate,
            } => {
                info!(
                    batch,
                    succeeded, failed, rejected, aggregate, "upload batch finished"
                );
            }
        }
    }
}

/// Forwards events into a bounded channel.
///
/// Events are dropped when the channel is full or the receiver is gone;
/// observers never apply backpressure to uploads.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<BatchEvent>,
}

impl ChannelObserver {
    /// Creates an observer and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BatchEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl UploadObserver for ChannelObserver {
    fn on_event(&self, event: &BatchEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            tracing::trace!(error = %e, "dropping batch event");
        }
    }
}
