//! Single-writer ledger task.
//!
//! One task owns the in-memory [`ProgressLedger`] and its [`LedgerStore`].
//! Workers hold cheap [`LedgerHandle`] clones and send commands; the task
//! applies them one at a time and persists after each mutation, so
//! concurrent outcomes can never lose an update.

use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::store::LedgerStore;
use super::types::ProgressLedger;
use crate::error::LedgerError;
use crate::job::{JobFailure, JobId, JobResult};

enum Command {
    Completion(JobResult),
    Failure(JobFailure),
    AdjustWorkers(i64),
    Log(String),
    Snapshot(oneshot::Sender<ProgressLedger>),
    Finish(oneshot::Sender<ProgressLedger>),
}

/// Sender side of the ledger task. Clone freely.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl LedgerHandle {
    /// Spawn the owning task. It runs until every handle is dropped.
    pub fn spawn(
        store: LedgerStore,
        ledger: ProgressLedger,
        known_ids: HashSet<JobId>,
    ) -> (Self, JoinHandle<ProgressLedger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = LedgerActor {
            store,
            ledger,
            known_ids,
        };
        let handle = tokio::spawn(actor.run(rx));
        (Self { tx }, handle)
    }

    fn send(&self, cmd: Command) -> Result<(), LedgerError> {
        self.tx.send(cmd).map_err(|_| LedgerError::Closed)
    }

    /// Add the job to the completed set, refresh counters, persist.
    pub fn record_completion(&self, result: JobResult) -> Result<(), LedgerError> {
        self.send(Command::Completion(result))
    }

    /// Increment the failure count, persist.
    pub fn record_failure(&self, failure: JobFailure) -> Result<(), LedgerError> {
        self.send(Command::Failure(failure))
    }

    /// Add `delta` to the active worker count, persist.
    pub fn adjust_active_workers(&self, delta: i64) -> Result<(), LedgerError> {
        self.send(Command::AdjustWorkers(delta))
    }

    /// Append a line to the rolling progress log.
    pub fn log(&self, message: impl Into<String>) -> Result<(), LedgerError> {
        self.send(Command::Log(message.into()))
    }

    /// Current in-memory ledger (after all previously sent commands).
    pub async fn snapshot(&self) -> Result<ProgressLedger, LedgerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| LedgerError::Closed)
    }

    /// Set `endTime`, zero `activeWorkers`, persist, and return the final ledger.
    pub async fn finish(&self) -> Result<ProgressLedger, LedgerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Finish(tx))?;
        rx.await.map_err(|_| LedgerError::Closed)
    }
}

struct LedgerActor {
    store: LedgerStore,
    ledger: ProgressLedger,
    known_ids: HashSet<JobId>,
}

impl LedgerActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) -> ProgressLedger {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Completion(result) => self.on_completion(result),
                Command::Failure(failure) => {
                    self.ledger.record_failure();
                    tracing::debug!(
                        job = failure.index,
                        kind = ?failure.kind,
                        failed = self.ledger.failed_count,
                        "recorded failure"
                    );
                    self.persist_progress();
                }
                Command::AdjustWorkers(delta) => {
                    self.ledger.adjust_active_workers(delta);
                    self.persist_progress();
                }
                Command::Log(message) => self.append_log(&message),
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.ledger.clone());
                }
                Command::Finish(reply) => {
                    self.ledger.finish();
                    self.persist_completed();
                    self.persist_progress();
                    let _ = reply.send(self.ledger.clone());
                }
            }
        }
        self.ledger
    }

    fn on_completion(&mut self, result: JobResult) {
        if !self.known_ids.contains(&result.index) {
            tracing::warn!(job = result.index, "completion for unknown job ignored");
            return;
        }
        if !self.ledger.record_completion(result.index) {
            tracing::debug!(job = result.index, "job already recorded as completed");
            return;
        }
        tracing::debug!(
            job = result.index,
            worker_id = result.worker_id,
            skipped = result.skipped,
            processed = self.ledger.processed_count,
            "recorded completion"
        );
        self.persist_completed();
        self.persist_progress();
    }

    // Routine save failures are non-fatal: log and keep the in-memory state,
    // the next successful write carries it to disk.
    fn persist_progress(&self) {
        if let Err(e) = self.store.save(&self.ledger) {
            tracing::warn!(error = %e, "progress save failed");
        }
    }

    fn persist_completed(&self) {
        if let Err(e) = self.store.save_completed(&self.ledger.completed_jobs) {
            tracing::warn!(error = %e, "completed-set save failed");
        }
    }

    fn append_log(&self, message: &str) {
        tracing::info!(target: "ferry::progress", "{}", message);
        if let Err(e) = self.store.append_log(message) {
            tracing::debug!(error = %e, "progress log write failed");
        }
    }
}
