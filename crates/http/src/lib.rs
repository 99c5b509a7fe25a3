//! HTTP upload transport for the dropzone coordinator.
//!
//! Files are sent as a multipart form; the request body is streamed in
//! chunks so the transport can report whole-percent progress while bytes
//! leave the process.

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};
