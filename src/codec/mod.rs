//! Single-item image codecs.
//!
//! A [`Codec`] turns one source into one converted artifact. The batch
//! coordinator treats every codec call as an opaque suspension point: it may
//! be CPU work moved onto the blocking pool ([`ImageCodec`]) or a round trip
//! to a conversion server ([`RemoteCodec`]).
//!
//! Codecs must be safe to call concurrently with different sources.

mod heif;
mod local;
mod remote;

pub use local::{decode_image, encode_jpeg, is_heif_data, ImageCodec};
pub use remote::RemoteCodec;

use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Handle to the bytes of a file queued for conversion.
///
/// Never interpreted by the batch; handed to the codec unchanged.
#[derive(Debug, Clone)]
pub enum SourceRef {
    /// File on the local filesystem.
    Path(PathBuf),
    /// Bytes already held in memory (e.g. an HTTP upload).
    Memory(Bytes),
}

impl SourceRef {
    /// Read the full source contents.
    pub async fn read(&self) -> Result<Bytes> {
        match self {
            SourceRef::Path(path) => {
                let data = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read source file: {:?}", path))?;
                Ok(Bytes::from(data))
            }
            SourceRef::Memory(data) => Ok(data.clone()),
        }
    }

    /// File name hint for codecs that need one.
    pub fn file_name(&self) -> Option<String> {
        match self {
            SourceRef::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
            SourceRef::Memory(_) => None,
        }
    }
}

/// A converted file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact(Bytes);

impl Artifact {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// Callback handle a codec uses to report intermediate progress.
///
/// Cheap to clone and safe to move into blocking tasks.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn Fn(u8) + Send + Sync>>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// A reporter that discards every report.
    pub fn noop() -> Self {
        Self { sink: None }
    }

    /// Report a percentage, clamped to `0..=100`.
    pub fn report(&self, percent: i32) {
        if let Some(ref sink) = self.sink {
            sink(percent.clamp(0, 100) as u8);
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("active", &self.sink.is_some())
            .finish()
    }
}

/// Converts a single source into a JPEG artifact.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Convert `source`, optionally reporting progress through `progress`.
    async fn convert(&self, source: &SourceRef, progress: &ProgressReporter) -> Result<Artifact>;
}

/// Build the codec selected by configuration.
///
/// `remote_override` takes precedence over `[remote].url`; without either the
/// local [`ImageCodec`] is used.
pub fn from_config(config: &Config, remote_override: Option<&str>) -> Result<Arc<dyn Codec>> {
    let remote_url = remote_override.or(config.remote.url.as_deref());

    match remote_url {
        Some(url) => {
            tracing::info!("Using remote codec at {}", url);
            Ok(Arc::new(RemoteCodec::new(url)?))
        }
        None => Ok(Arc::new(ImageCodec::from_config(&config.output))),
    }
}
