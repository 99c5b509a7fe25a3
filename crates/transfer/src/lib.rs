//! Upload data model shared by the dropzone crates.
//!
//! Files offered by a drop or picker event are validated here, turned into
//! per-file [`UploadTask`]s, and their progress is folded into a single
//! batch percentage by [`aggregate_progress`].

mod progress;
mod types;
mod validation;

pub use progress::{PercentCounter, aggregate_progress};
pub use types::{
    FileSource, TaskStatus, UploadFile, UploadResult, UploadTask, detect_content_type,
};
pub use validation::{
    AcceptPattern, RejectCode, Rejection, UploadConstraints, Validated, validate_candidates,
};

/// Upper bound of a progress percentage.
pub const MAX_PROGRESS: u8 = 100;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid accept pattern: {0}")]
    InvalidAcceptPattern(String),
}
