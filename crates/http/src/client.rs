//! Multipart upload client.
//!
//! Async HTTP client using `reqwest` with optional Bearer token
//! authentication.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use dropzone_batch::{ProgressFn, TransportError, UploadOptions, UploadTransport};
use dropzone_transfer::{FileSource, PercentCounter, UploadFile, UploadResult};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt, stream};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Size of each streamed body chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Body chunks of one file, produced on demand.
type PayloadStream = BoxStream<'static, io::Result<Bytes>>;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// URL the multipart form is posted to.
    pub endpoint: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub api_token: Option<String>,
    /// Optional `kind` form field describing what is uploaded.
    pub kind: Option<String>,
    pub timeout: Duration,
    /// Return the batch's mock result instead of uploading, when one is given.
    pub use_mock_results: bool,
}

impl HttpTransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: None,
            kind: None,
            timeout: DEFAULT_TIMEOUT,
            use_mock_results: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Uploads files with a multipart `POST`.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    kind: Option<String>,
    use_mock_results: bool,
}

impl HttpTransport {
    /// Creates a transport from its configuration.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| TransportError::Other("invalid API token".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(request_error)?;

        Ok(Self {
            http,
            endpoint: config.endpoint,
            kind: config.kind,
            use_mock_results: config.use_mock_results,
        })
    }

    async fn send(
        &self,
        file: &UploadFile,
        options: UploadOptions,
    ) -> Result<UploadResult, TransportError> {
        if let (true, Some(url)) = (self.use_mock_results, options.mock_result.clone()) {
            debug!(file = %file.name, "returning mock upload result");
            options.report(100);
            return Ok(UploadResult::new(url));
        }

        let (chunks, total) = open_payload(file).await?;
        let counter = Arc::new(Mutex::new(PercentCounter::new(total)));

        let body = reqwest::Body::wrap_stream(progress_stream(
            chunks,
            Arc::clone(&counter),
            Arc::clone(&options.on_progress),
        ));
        let part = Part::stream_with_length(body, total)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(request_error)?;

        let mut form = Form::new().part("file", part);
        if let Some(kind) = &self.kind {
            form = form.text("kind", kind.clone());
        }

        debug!(file = %file.name, bytes = total, endpoint = %self.endpoint, "uploading file");
        let resp = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(file = %file.name, status = status.as_u16(), "upload rejected by server");
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await.map_err(request_error)?;
        let result = parse_response(&body)?;

        let finished = counter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .finish();
        if let Some(progress) = finished {
            options.report(progress);
        }

        Ok(result)
    }
}

impl UploadTransport for HttpTransport {
    fn upload<'a>(
        &'a self,
        file: &'a UploadFile,
        options: UploadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResult, TransportError>> + Send + 'a>> {
        Box::pin(self.send(file, options))
    }
}

/// Opens the file's content as a chunk stream, with its total length.
///
/// Files on disk are read one chunk at a time. In-memory payloads are sliced
/// without copying.
async fn open_payload(file: &UploadFile) -> Result<(PayloadStream, u64), TransportError> {
    match &file.source {
        FileSource::Memory(data) => {
            let total = data.len();
            let buffer = Bytes::from_owner(Arc::clone(data));
            let chunks = (0..total).step_by(CHUNK_SIZE).map(move |start| -> io::Result<Bytes> {
                Ok(buffer.slice(start..(start + CHUNK_SIZE).min(total)))
            });
            Ok((stream::iter(chunks).boxed(), total as u64))
        }
        FileSource::Path(path) => {
            let handle = tokio::fs::File::open(path).await?;
            let total = handle.metadata().await?.len();
            Ok((ReaderStream::with_capacity(handle, CHUNK_SIZE).boxed(), total))
        }
    }
}

/// Reports progress as each chunk is pulled into the request body.
fn progress_stream<S>(
    chunks: S,
    counter: Arc<Mutex<PercentCounter>>,
    on_progress: ProgressFn,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    chunks.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            let advanced = counter
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .advance(bytes.len() as u64);
            if let Some(progress) = advanced {
                on_progress(progress);
            }
        }
        chunk
    })
}

fn parse_response(body: &[u8]) -> Result<UploadResult, TransportError> {
    let resp: UploadResponse = serde_json::from_slice(body)
        .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
    if resp.url.is_empty() {
        return Err(TransportError::InvalidResponse("empty url".into()));
    }
    Ok(UploadResult::new(resp.url))
}

fn request_error(e: reqwest::Error) -> TransportError {
    if let Some(status) = e.status() {
        return TransportError::Http {
            status: status.as_u16(),
            body: e.to_string(),
        };
    }
    if e.is_timeout() {
        return TransportError::Other("request timed out".into());
    }
    TransportError::Other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let f: ProgressFn = Arc::new(move |p: u8| s.lock().unwrap().push(p));
        (f, seen)
    }

    /// Serves one request with the given status and body, returning the raw
    /// request bytes.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request.ends_with(b"--\r\n") || request.ends_with(b"0\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (format!("http://{addr}/api/images"), handle)
    }

    #[test]
    fn parse_response_reads_url() {
        let result = parse_response(br#"{"url":"https://cdn/a.png","extra":1}"#).unwrap();
        assert_eq!(result.url, "https://cdn/a.png");
    }

    #[test]
    fn parse_response_requires_url() {
        assert!(matches!(
            parse_response(br#"{"id":"x"}"#),
            Err(TransportError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(br#"{"url":""}"#),
            Err(TransportError::InvalidResponse(_))
        ));
        assert!(parse_response(b"not json").is_err());
    }

    #[tokio::test]
    async fn memory_payload_is_sliced_without_copying() {
        let data = vec![7u8; CHUNK_SIZE * 3 + 10];
        let file = UploadFile::from_bytes("a.bin", "application/octet-stream", data);
        let FileSource::Memory(shared) = &file.source else {
            panic!("expected an in-memory source");
        };
        let base = shared.as_ptr();

        let (chunks, total) = open_payload(&file).await.unwrap();
        assert_eq!(total, (CHUNK_SIZE * 3 + 10) as u64);

        let chunks: Vec<Bytes> = chunks.map(|c| c.unwrap()).collect().await;
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, CHUNK_SIZE, 10]);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.as_ptr(), base.wrapping_add(i * CHUNK_SIZE));
        }
    }

    #[tokio::test]
    async fn path_payload_is_read_in_bounded_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let len = CHUNK_SIZE * 2 + 5;
        std::fs::write(&path, vec![3u8; len]).unwrap();
        let file = UploadFile::from_path(&path).unwrap();

        let (chunks, total) = open_payload(&file).await.unwrap();
        assert_eq!(total, len as u64);

        let chunks: Vec<Bytes> = chunks.map(|c| c.unwrap()).collect().await;
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= CHUNK_SIZE));
        assert_eq!(chunks.iter().map(Bytes::len).sum::<usize>(), len);
    }

    #[tokio::test]
    async fn progress_stream_reports_whole_percent_steps() {
        let (f, seen) = recorder();
        let file = UploadFile::from_bytes("a.bin", "application/octet-stream", vec![7u8; CHUNK_SIZE * 3 + 10]);
        let (chunks, total) = open_payload(&file).await.unwrap();
        let counter = Arc::new(Mutex::new(PercentCounter::new(total)));

        let sent: Vec<_> = progress_stream(chunks, counter, f).collect().await;

        assert_eq!(sent.len(), 4);
        let bytes: usize = sent.iter().map(|c| c.as_ref().unwrap().len()).sum();
        assert_eq!(bytes as u64, total);

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn mock_result_skips_network() {
        let mut config = HttpTransportConfig::new("http://127.0.0.1:9/unused");
        config.use_mock_results = true;
        let transport = HttpTransport::new(config).unwrap();

        let (f, seen) = recorder();
        let mut options = UploadOptions::new(f);
        options.mock_result = Some("https://mock/0".into());

        let file = UploadFile::from_bytes("a.png", "image/png", vec![1u8; 4]);
        let result = transport.upload(&file, options).await.unwrap();

        assert_eq!(result.url, "https://mock/0");
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn uploads_multipart_and_parses_url() {
        let (endpoint, server) = serve_once("200 OK", r#"{"url":"https://cdn/logo.png"}"#).await;
        let mut config = HttpTransportConfig::new(endpoint);
        config.api_token = Some("secret".into());
        config.kind = Some("ACCOUNT_AVATAR".into());
        let transport = HttpTransport::new(config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, vec![42u8; 1000]).unwrap();
        let file = UploadFile::from_path(&path).unwrap();

        let (f, seen) = recorder();
        let result = transport.upload(&file, UploadOptions::new(f)).await.unwrap();
        assert_eq!(result.url, "https://cdn/logo.png");
        assert_eq!(seen.lock().unwrap().last(), Some(&100));

        let request = String::from_utf8_lossy(&server.await.unwrap()).to_string();
        assert!(request.starts_with("POST /api/images"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains("filename=\"logo.png\""));
        assert!(request.contains("image/png"));
        assert!(request.contains("ACCOUNT_AVATAR"));
    }

    #[tokio::test]
    async fn server_error_is_http_failure() {
        let (endpoint, server) =
            serve_once("500 Internal Server Error", r#"{"error":"disk full"}"#).await;
        let transport = HttpTransport::new(HttpTransportConfig::new(endpoint)).unwrap();

        let (f, _) = recorder();
        let file = UploadFile::from_bytes("a.png", "image/png", vec![1u8; 16]);
        let err = transport.upload(&file, UploadOptions::new(f)).await.unwrap_err();

        match err {
            TransportError::Http { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("disk full"));
            }
            other => panic!("unexpected error: {other}"),
        }
        server.await.unwrap();
    }

    #[test]
    fn rejects_invalid_token() {
        let mut config = HttpTransportConfig::new("http://localhost/upload");
        config.api_token = Some("bad\ntoken".into());
        assert!(HttpTransport::new(config).is_err());
    }
}
