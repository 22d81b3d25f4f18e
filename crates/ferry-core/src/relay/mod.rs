//! Relay-uploader collaborator: push a local artifact to a keyed remote store.
//!
//! Two backends: [`HttpRelay`] (object store over HEAD/PUT) and [`DirRelay`]
//! (a local directory tree, mainly for staging and tests). Both report an
//! already-present destination as [`UploadOutcome::AlreadyExists`] rather
//! than an error so the executor can treat it as a skip.

mod content_type;
mod dir;
mod http;

use std::path::Path;

pub use content_type::content_type_for;
pub use dir::DirRelay;
pub use http::{HttpRelay, TransferLimits};

use crate::config::{RelayConfig, RelayKind};

/// Error from the relay store.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Credentials rejected (HTTP 401/403).
    #[error("access denied (HTTP {0}); check relay credentials")]
    Auth(u32),
    /// Could not reach the store.
    #[error("connectivity: {0}")]
    Connectivity(#[from] curl::Error),
    /// Bucket or store root does not exist.
    #[error("destination store not found: {0}")]
    NoSuchStore(String),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay misconfigured: {0}")]
    Config(String),
}

/// Result of an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded {
        /// Store-provided entity tag, if any.
        etag: Option<String>,
        /// SHA-256 of the uploaded bytes (lowercase hex).
        sha256: String,
    },
    AlreadyExists,
}

/// Keyed remote store.
pub trait Relay: Send + Sync {
    /// Whether an object already exists at `key`.
    fn exists(&self, key: &str) -> Result<bool, RelayError>;

    /// Upload `source` to `key`. Returns `AlreadyExists` without writing when
    /// the key is present.
    fn upload(
        &self,
        source: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<UploadOutcome, RelayError>;

    /// Check reachability and credentials.
    fn check(&self) -> Result<(), RelayError>;
}

/// Build the relay selected by `[relay]` config.
pub fn from_config(cfg: &RelayConfig) -> Result<Box<dyn Relay>, RelayError> {
    match cfg.kind {
        RelayKind::Http => {
            let endpoint = cfg
                .endpoint
                .as_deref()
                .ok_or_else(|| RelayError::Config("relay.endpoint is required".to_string()))?;
            let bucket = cfg.effective_bucket().ok_or_else(|| {
                RelayError::Config("relay.bucket (or FERRY_BUCKET) is required".to_string())
            })?;
            let relay = HttpRelay::new(endpoint, &bucket)?
                .with_token(cfg.token())
                .with_storage_class(cfg.storage_class.clone())
                .with_limits(TransferLimits::from(cfg));
            Ok(Box::new(relay))
        }
        RelayKind::Dir => {
            let root = cfg
                .root
                .as_deref()
                .ok_or_else(|| RelayError::Config("relay.root is required".to_string()))?;
            Ok(Box::new(DirRelay::new(root)))
        }
    }
}

/// Reject keys that would escape the store (`..`, absolute, empty segments).
pub(crate) fn validate_key(key: &str) -> Result<(), RelayError> {
    let trimmed = key.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(RelayError::Config("empty destination key".to_string()));
    }
    if trimmed.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(RelayError::Config(format!("invalid destination key: {key}")));
    }
    Ok(())
}
