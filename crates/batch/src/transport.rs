//! Upload transport trait and an in-process mock.
//!
//! `UploadTransport` is implemented by whatever performs the byte transfer
//! (see `dropzone-http`). Keeping it a trait leaves the coordinator free of
//! network code and testable with scripted transports.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dropzone_transfer::{UploadFile, UploadResult};

use crate::error::TransportError;

/// Progress callback bound to a single task. Receives whole percentages.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Produces a mock result for the task at the given batch index.
pub type MockResultFn = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// Per-call options handed to the transport.
#[derive(Clone)]
pub struct UploadOptions {
    pub on_progress: ProgressFn,
    /// Result the transport may return instead of uploading, when it is
    /// configured to honour mocks.
    pub mock_result: Option<String>,
}

impl UploadOptions {
    /// Options with the given progress callback and no mock.
    pub fn new(on_progress: ProgressFn) -> Self {
        Self {
            on_progress,
            mock_result: None,
        }
    }

    /// Forwards a progress value to the bound callback.
    pub fn report(&self, progress: u8) {
        (self.on_progress)(progress);
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("mock_result", &self.mock_result)
            .finish_non_exhaustive()
    }
}

/// Performs the transfer of one file.
///
/// Implementations call `options.on_progress` with non-decreasing values in
/// `0..=100` while the transfer runs and resolve with the stored file's
/// handle.
pub trait UploadTransport: Send + Sync {
    fn upload<'a>(
        &'a self,
        file: &'a UploadFile,
        options: UploadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResult, TransportError>> + Send + 'a>>;
}

impl<T: UploadTransport + ?Sized> UploadTransport for Arc<T> {
    fn upload<'a>(
        &'a self,
        file: &'a UploadFile,
        options: UploadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResult, TransportError>> + Send + 'a>> {
        (**self).upload(file, options)
    }
}

/// Placeholder image URL used when no mock generator is configured.
pub fn default_mock_result() -> String {
    format!("https://loremflickr.com/120/120?lock={}", uuid::Uuid::new_v4())
}

/// Transport that never touches the network.
///
/// Reports a fixed series of progress steps, optionally pausing between
/// them, then resolves with the call's `mock_result` (or a generated
/// placeholder URL).
#[derive(Debug, Clone)]
pub struct MockTransport {
    steps: Vec<u8>,
    step_delay: Duration,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Reports 25, 50, 75 and 100 with no delay.
    pub fn new() -> Self {
        Self {
            steps: vec![25, 50, 75, 100],
            step_delay: Duration::ZERO,
        }
    }

    /// Replaces the reported progress steps.
    pub fn with_steps(mut self, steps: Vec<u8>) -> Self {
        self.steps = steps;
        self
    }

    /// Sleeps for `delay` before each step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

impl UploadTransport for MockTransport {
    fn upload<'a>(
        &'a self,
        file: &'a UploadFile,
        options: UploadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResult, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            for &step in &self.steps {
                if !self.step_delay.is_zero() {
                    tokio::time::sleep(self.step_delay).await;
                }
                options.report(step);
            }

            let url = options.mock_result.unwrap_or_else(default_mock_result);
            tracing::trace!(file = %file.name, %url, "mock upload resolved");
            Ok(UploadResult::new(url))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let f: ProgressFn = Arc::new(move |p: u8| s.lock().unwrap().push(p));
        (f, seen)
    }

    fn file() -> UploadFile {
        UploadFile::from_bytes("a.png", "image/png", vec![1u8, 2, 3])
    }

    #[tokio::test]
    async fn mock_reports_steps_and_returns_mock() {
        let (f, seen) = recorder();
        let mut options = UploadOptions::new(f);
        options.mock_result = Some("https://cdn/mock.png".into());

        let transport = MockTransport::new();
        let result = transport.upload(&file(), options).await.unwrap();

        assert_eq!(result.url, "https://cdn/mock.png");
        assert_eq!(*seen.lock().unwrap(), vec![25, 50, 75, 100]);
    }

    #[tokio::test]
    async fn mock_without_result_generates_placeholder() {
        let (f, _) = recorder();
        let transport = MockTransport::new().with_steps(vec![100]);
        let result = transport.upload(&file(), UploadOptions::new(f)).await.unwrap();
        assert!(result.url.starts_with("https://loremflickr.com/120/120?lock="));
    }

    #[tokio::test(start_paused = true)]
    async fn mock_step_delay_advances_time() {
        let (f, seen) = recorder();
        let transport = MockTransport::new()
            .with_steps(vec![50, 100])
            .with_step_delay(Duration::from_millis(200));

        let start = tokio::time::Instant::now();
        transport.upload(&file(), UploadOptions::new(f)).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(400));
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }

    #[test]
    fn placeholder_urls_are_unique() {
        assert_ne!(default_mock_result(), default_mock_result());
    }
}
