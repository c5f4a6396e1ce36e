//! Snapshot storage backends.
//!
//! All backends implement the [`StorageBackend`] trait:
//!
//! - [`LocalFileBackend`] -- a file on local disk, replaced by atomic rename
//! - [`GcsBackend`] -- a Google Cloud Storage object
//! - [`S3Backend`] -- an S3 (or S3-compatible) object
//!
//! Exactly one backend is chosen at startup by [`from_config`].

pub mod gcs;
pub mod local;
pub mod s3;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, StorageConfig};

pub use gcs::GcsBackend;
pub use local::LocalFileBackend;
pub use s3::S3Backend;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Loading failed for a transient reason (I/O, permissions, network).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Saving failed. The previously stored payload is still intact.
    #[error("save failed: {0}")]
    Save(String),

    /// The backend could not be constructed from its configuration.
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

/// Outcome of a liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub healthy: bool,
    pub detail: String,
}

impl Health {
    pub fn healthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: true,
            detail: detail.into(),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: detail.into(),
        }
    }
}

/// Durable home of the encoded forest snapshot.
///
/// All implementations must satisfy these invariants:
/// - `save` is atomic: a concurrent `load` sees the complete previous payload
///   or the complete new one, never a mix.
/// - `load` returns the payload of the most recent successful `save`.
/// - `health` is cheap and never reads or writes application data.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the most recently saved payload.
    ///
    /// Returns `Ok(None)` if nothing has ever been saved.
    async fn load(&self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the stored payload.
    async fn save(&self, payload: &[u8]) -> Result<(), StorageError>;

    /// Check whether the backend is reachable and usable.
    async fn health(&self) -> Health;
}

/// Build the backend selected by `config`.
pub fn from_config(config: &Config) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let backend: Arc<dyn StorageBackend> = match &config.storage {
        StorageConfig::Local { path } => {
            tracing::info!("Using local file storage at {}", path.display());
            Arc::new(LocalFileBackend::new(path.clone()))
        }
        StorageConfig::Gcs(gcs) => {
            tracing::info!("Using GCS storage at gs://{}/{}", gcs.bucket, gcs.object);
            Arc::new(GcsBackend::new(gcs.clone(), config.request_timeout)?)
        }
        StorageConfig::S3(s3) => {
            tracing::info!("Using S3 storage at s3://{}/{}", s3.bucket, s3.key);
            Arc::new(S3Backend::new(s3.clone(), config.request_timeout)?)
        }
    };
    Ok(backend)
}

/// HTTP client shared by the remote backends.
fn http_client(timeout: Duration) -> Result<reqwest::Client, StorageError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StorageError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Percent-encode an object path one segment at a time, keeping the slashes.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
