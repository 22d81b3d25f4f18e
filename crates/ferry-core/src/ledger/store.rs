//! On-disk layout of the ledger: progress document, completed-set document
//! and the rolling progress log, all under one state directory.

use chrono::{Local, Utc};
use std::collections::{BTreeSet, HashSet};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::types::ProgressLedger;
use crate::error::LedgerError;
use crate::job::JobId;
use crate::storage;

pub const PROGRESS_FILE: &str = "progress.json";
pub const COMPLETED_FILE: &str = "completed.json";
pub const LOG_FILE: &str = "progress.log";

#[derive(Debug, Clone)]
pub struct LedgerStore {
    progress_path: PathBuf,
    completed_path: PathBuf,
    log_path: PathBuf,
}

impl LedgerStore {
    /// Standard file names under `state_dir`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            progress_path: state_dir.join(PROGRESS_FILE),
            completed_path: state_dir.join(COMPLETED_FILE),
            log_path: state_dir.join(LOG_FILE),
        }
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    pub fn completed_path(&self) -> &Path {
        &self.completed_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Load the progress document; `None` if it does not exist yet.
    pub fn load(&self) -> Result<Option<ProgressLedger>, LedgerError> {
        read_json(&self.progress_path)
    }

    /// Replace the progress document.
    pub fn save(&self, ledger: &ProgressLedger) -> Result<(), LedgerError> {
        write_json(&self.progress_path, ledger)
    }

    /// Load the completed-identifier set; `None` if it does not exist yet.
    pub fn load_completed(&self) -> Result<Option<BTreeSet<JobId>>, LedgerError> {
        read_json(&self.completed_path)
    }

    /// Replace the completed-identifier document.
    pub fn save_completed(&self, completed: &BTreeSet<JobId>) -> Result<(), LedgerError> {
        write_json(&self.completed_path, completed)
    }

    /// Append one `[HH:MM:SS] message` line to the rolling log.
    pub fn append_log(&self, message: &str) -> io::Result<()> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "[{}] {}", Local::now().format("%H:%M:%S"), message)
    }

    /// Load (or create) the ledger for a job list of `total_jobs` with the
    /// given identifiers, reconcile it, and persist both documents.
    ///
    /// The completed-set document is authoritative; if it is missing, the set
    /// embedded in the progress document is used. Identifiers not in
    /// `known_ids` are dropped. Any error here is fatal to the run.
    pub fn open_or_init(
        &self,
        total_jobs: u64,
        known_ids: &HashSet<JobId>,
    ) -> Result<ProgressLedger, LedgerError> {
        let progress = self.load()?;
        let completed = self.load_completed()?;
        let fresh = progress.is_none();

        let mut ledger = progress.unwrap_or_else(|| ProgressLedger::new(total_jobs));
        let mut set = match completed {
            Some(set) => set,
            None => std::mem::take(&mut ledger.completed_jobs),
        };
        let before = set.len();
        set.retain(|id| known_ids.contains(id));
        if set.len() != before {
            tracing::warn!(
                dropped = before - set.len(),
                "ignoring completed identifiers not present in the job list"
            );
        }

        ledger.total_jobs = total_jobs;
        ledger.completed_jobs = set;
        ledger.processed_count = ledger.completed_jobs.len() as u64;
        ledger.active_workers = 0;
        ledger.end_time = None;
        ledger.last_updated = Utc::now();

        self.save_completed(&ledger.completed_jobs)?;
        self.save(&ledger)?;
        if fresh {
            tracing::info!(path = %self.progress_path.display(), "initialized new progress ledger");
        } else {
            tracing::info!(
                completed = ledger.processed_count,
                failed = ledger.failed_count,
                "resuming from existing progress ledger"
            );
        }
        Ok(ledger)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, LedgerError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LedgerError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| LedgerError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let json = serde_json::to_vec_pretty(value)?;
    storage::write_atomic(path, &json).map_err(|source| LedgerError::Write {
        path: path.to_path_buf(),
        source,
    })
}
