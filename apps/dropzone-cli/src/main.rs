//! Dropzone command-line entry point.
//!
//! Treats the given paths as one drop event: validates them, uploads the
//! accepted files concurrently and prints the resulting URLs.

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dropzone_batch::{
    BatchCallbacks, BatchEvent, BatchOptions, Delivery, MockResultFn, MockTransport,
    TracingObserver, UploadCoordinator, UploadObserver, UploadTransport, default_mock_result,
};
use dropzone_http::HttpTransport;
use dropzone_transfer::{Rejection, UploadFile, UploadResult};
use tracing_subscriber::EnvFilter;

use config::DropzoneConfig;

#[derive(Parser, Debug)]
#[command(name = "dropzone")]
#[command(author, version, about = "Upload files in one concurrent batch", long_about = None)]
struct Args {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Upload endpoint (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// Accepted types, e.g. "image/*,.pdf" (overrides the config file)
    #[arg(long)]
    accept: Option<String>,

    /// Upload only the first accepted file
    #[arg(long)]
    single: bool,

    /// Do not touch the network; resolve with placeholder URLs
    #[arg(long)]
    mock: bool,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Logs events and draws the aggregate percentage on stderr.
struct ConsoleObserver;

impl UploadObserver for ConsoleObserver {
    fn on_event(&self, event: &BatchEvent) {
        TracingObserver.on_event(event);
        match event {
            BatchEvent::Progress { aggregate, .. } => {
                draw_progress(&mut std::io::stderr(), *aggregate);
            }
            BatchEvent::Finished { .. } => eprintln!(),
            _ => {}
        }
    }
}

/// Redraws the progress line in place. Terminal errors only cost the redraw.
fn draw_progress(out: &mut impl Write, aggregate: u8) {
    if let Err(e) = write!(out, "\ruploading... {aggregate:>3}%").and_then(|()| out.flush()) {
        tracing::trace!(error = %e, "failed to draw progress line");
    }
}

/// Prints uploaded URLs to stdout and rejections to stderr.
struct ConsoleCallbacks;

impl BatchCallbacks for ConsoleCallbacks {
    fn on_success(&self, results: Delivery<UploadResult>) {
        for result in results.into_vec() {
            println!("{}", result.url);
        }
    }

    fn on_reject(&self, rejected: Delivery<Rejection>) {
        for rejection in rejected.into_vec() {
            let codes: Vec<&str> = rejection.errors.iter().map(|c| c.as_str()).collect();
            eprintln!("rejected {}: {}", rejection.file.name, codes.join(", "));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => DropzoneConfig::load_from(path)?,
        None => DropzoneConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            DropzoneConfig::default()
        }),
    };
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(accept) = args.accept {
        config.accept = accept;
    }
    if args.single {
        config.is_multi = false;
    }

    let constraints = config.constraints()?;
    let files = args
        .files
        .iter()
        .map(|path| {
            UploadFile::from_path(path).with_context(|| format!("cannot read {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut options = BatchOptions::new(constraints.is_multi);
    let transport: Arc<dyn UploadTransport> = if args.mock {
        Arc::new(MockTransport::new().with_step_delay(Duration::from_millis(150)))
    } else {
        if config.endpoint.is_empty() {
            anyhow::bail!("no upload endpoint configured; pass --endpoint or set it in the config file");
        }
        Arc::new(HttpTransport::new(config.transport_config())?)
    };
    if args.mock || config.use_mock_results {
        let generator: MockResultFn = Arc::new(|_: usize| default_mock_result());
        options = options.with_mock_results(generator);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        files = files.len(),
        multi = constraints.is_multi,
        "starting upload"
    );

    let coordinator = UploadCoordinator::new(transport).with_observer(Arc::new(ConsoleObserver));
    let report = coordinator
        .drop_files(files, &constraints, options, &ConsoleCallbacks)
        .await?;

    let Some(report) = report else {
        anyhow::bail!("no file passed validation");
    };
    for failed in &report.failed {
        eprintln!("failed {}: {}", failed.file_name, failed.error);
    }
    if !report.failed.is_empty() {
        anyhow::bail!("{} file(s) failed to upload", report.failed.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts writes but fails every flush.
    struct BrokenFlush(Vec<u8>);

    impl Write for BrokenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("terminal gone"))
        }
    }

    #[test]
    fn progress_line_is_drawn_in_place() {
        let mut out = Vec::new();
        draw_progress(&mut out, 7);
        assert_eq!(String::from_utf8(out).unwrap(), "\ruploading...   7%");
    }

    #[test]
    fn failed_flush_does_not_panic() {
        let mut out = BrokenFlush(Vec::new());
        draw_progress(&mut out, 100);
        assert_eq!(String::from_utf8(out.0).unwrap(), "\ruploading... 100%");
    }
}
