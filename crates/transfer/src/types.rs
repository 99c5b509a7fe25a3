use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{MAX_PROGRESS, TransferError};

/// MIME type used when the extension is not recognised.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Where the bytes of an [`UploadFile`] live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Bytes already held in memory (e.g. handed over by a picker).
    Memory(Arc<[u8]>),
    /// A file on the local filesystem, read by the transport.
    Path(PathBuf),
}

/// A candidate file offered to the dropzone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Display name, usually the base file name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Payload location.
    pub source: FileSource,
}

impl UploadFile {
    /// Creates an in-memory file.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            source: FileSource::Memory(data),
        }
    }

    /// Describes a file on disk without reading it.
    ///
    /// The MIME type is guessed from the extension.
    pub fn from_path(path: &Path) -> Result<Self, TransferError> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = detect_content_type(&name).unwrap_or(FALLBACK_CONTENT_TYPE);

        Ok(Self {
            name,
            size: metadata.len(),
            mime_type: mime_type.to_string(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Loads the payload into memory.
    pub fn read_bytes(&self) -> Result<Vec<u8>, TransferError> {
        match &self.source {
            FileSource::Memory(data) => Ok(data.to_vec()),
            FileSource::Path(path) => Ok(std::fs::read(path)?),
        }
    }

    /// Returns the lowercase extension including the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
    }
}

/// Handle returned by a transport once a file is stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
}

impl UploadResult {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Lifecycle of a single upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Returns `true` once the task can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// Per-file unit of upload work.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// Position within the batch.
    pub index: usize,
    pub file: UploadFile,
    /// Last reported progress, 0..=100.
    pub progress: u8,
    pub status: TaskStatus,
    /// Set only when `status` is [`TaskStatus::Succeeded`].
    pub result: Option<UploadResult>,
    /// Set only when `status` is [`TaskStatus::Failed`].
    pub error: Option<String>,
}

impl UploadTask {
    /// Creates a pending task with zero progress.
    pub fn new(index: usize, file: UploadFile) -> Self {
        Self {
            index,
            file,
            progress: 0,
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Marks the task as dispatched to the transport.
    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::InFlight;
        }
    }

    /// Replaces the progress value. Values above 100 are clamped.
    ///
    /// Ordering is the transport's business: a lower value than the last
    /// one is stored as-is.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(MAX_PROGRESS);
    }

    /// Records a successful upload.
    pub fn succeed(&mut self, result: UploadResult) {
        self.status = TaskStatus::Succeeded;
        self.result = Some(result);
        self.error = None;
    }

    /// Records a transport failure.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
    }
}

/// Guesses a MIME type from a file name's extension.
pub fn detect_content_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("gif") => Some("image/gif"),
        Some("svg") => Some("image/svg+xml"),
        Some("ico") => Some("image/x-icon"),
        Some("pdf") => Some("application/pdf"),
        Some("csv") => Some("text/csv"),
        Some("txt") => Some("text/plain"),
        Some("json") => Some("application/json"),
        _ => None,
    }
}
