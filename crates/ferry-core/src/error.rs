//! Error taxonomy shared by the executor, ledger and orchestrator.
//!
//! Job-scoped errors (`TransferFailure`) are recorded and never abort the run.
//! `LedgerError` is swallowed for routine saves but fatal during initialization,
//! as is `JobListError`.

use std::path::PathBuf;

use crate::fetcher::FetchError;
use crate::job::JobId;
use crate::relay::RelayError;

/// Pipeline stage a transfer failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Fetch,
    Relay,
    /// Preparing the temp location (e.g. creating the temp dir).
    Prepare,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStage::Fetch => write!(f, "download"),
            TransferStage::Relay => write!(f, "upload"),
            TransferStage::Prepare => write!(f, "prepare"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferCause {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fetch or relay error for one job. Non-fatal to the run.
#[derive(Debug, thiserror::Error)]
#[error("job {index}: {stage} failed: {cause}")]
pub struct TransferFailure {
    pub index: JobId,
    pub stage: TransferStage,
    #[source]
    pub cause: TransferCause,
}

impl TransferFailure {
    pub fn new(index: JobId, stage: TransferStage, cause: impl Into<TransferCause>) -> Self {
        Self {
            index,
            stage,
            cause: cause.into(),
        }
    }
}

/// Persisted-state read/write error.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The ledger actor has stopped (channel closed).
    #[error("ledger actor is not running")]
    Closed,
}

/// Invalid or unreadable static job list.
#[derive(Debug, thiserror::Error)]
pub enum JobListError {
    #[error("read job list {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse job list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate job index {0}")]
    DuplicateIndex(JobId),
    #[error("job {index}: invalid download URL: {reason}")]
    InvalidUrl { index: JobId, reason: String },
    #[error("job {0}: empty destination path")]
    EmptyDestination(JobId),
}
