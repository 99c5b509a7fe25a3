//! Batch and transport error types.

/// Errors produced by the coordinator itself.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("an upload batch is already in progress")]
    BatchInProgress,
}

/// Errors reported by an [`UploadTransport`](crate::UploadTransport).
///
/// A transport error fails one task only; sibling tasks keep running.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl From<dropzone_transfer::TransferError> for TransportError {
    fn from(e: dropzone_transfer::TransferError) -> Self {
        match e {
            dropzone_transfer::TransferError::Io(io) => TransportError::Io(io),
            other => TransportError::Other(other.to_string()),
        }
    }
}
