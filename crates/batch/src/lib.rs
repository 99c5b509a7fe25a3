//! Batch upload coordinator for a drag-and-drop dropzone.
//!
//! A drop (or picker) event hands the coordinator a set of candidate files.
//! The coordinator turns each accepted file into an upload task, dispatches
//! every task to an [`UploadTransport`] at once, folds per-task progress into
//! a single percentage, and delivers the results back to the caller when the
//! last task settles.
//!
//! The crate has no network code of its own: transports and presentation
//! are plugged in through traits so the coordination logic can be tested
//! with scripted doubles.

pub mod batch;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod observer;
pub mod transport;

pub use batch::{BatchState, FailedUpload};
pub use coordinator::{
    BatchCallbacks, BatchOptions, BatchReport, CoordinatorState, Delivery, UploadCoordinator,
    UploadSnapshot,
};
pub use display::{DisplayMode, DragState, DropzoneView};
pub use error::{BatchError, TransportError};
pub use observer::{BatchEvent, ChannelObserver, TracingObserver, UploadObserver};
pub use transport::{
    MockResultFn, MockTransport, ProgressFn, UploadOptions, UploadTransport, default_mock_result,
};
