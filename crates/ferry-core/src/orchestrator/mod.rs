//! Parallel task orchestrator.
//!
//! Loads (or creates) the progress ledger, computes the unprocessed jobs,
//! and runs up to N worker slots that pull from one shared cursor. Each slot
//! dispatches its claimed job through the isolation boundary and reports the
//! outcome to the single-writer ledger task. A job's failure never stops the
//! run; only ledger initialization failure does.

mod cursor;
mod summary;
mod worker;

pub use cursor::{unprocessed, Claim, JobCursor};
pub use summary::{format_elapsed, RunCounts, RunSummary};
pub use worker::SlotState;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::control::ShutdownSignal;
use crate::error::LedgerError;
use crate::executor::JobExecutor;
use crate::job::{Job, JobId};
use crate::ledger::{LedgerHandle, LedgerStore};
use worker::WorkerSlot;

/// Global run phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    Running,
    Draining,
    Completed,
}

pub struct Orchestrator {
    executor: Arc<JobExecutor>,
    store: LedgerStore,
    workers: usize,
    shutdown: ShutdownSignal,
    phase: Arc<watch::Sender<RunPhase>>,
}

impl Orchestrator {
    /// `workers` is clamped to at least 1.
    pub fn new(executor: Arc<JobExecutor>, store: LedgerStore, workers: usize) -> Self {
        let (phase, _) = watch::channel(RunPhase::Initializing);
        Self {
            executor,
            store,
            workers: workers.max(1),
            shutdown: ShutdownSignal::new(),
            phase: Arc::new(phase),
        }
    }

    /// Use an externally owned shutdown token (e.g. one wired to signals).
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Process every job not yet in the completed set, then write the final
    /// snapshot and return the summary. Errors only if the ledger cannot be
    /// loaded or created.
    pub async fn run(&self, jobs: &[Job]) -> Result<RunSummary, LedgerError> {
        let started = Instant::now();
        self.set_phase(RunPhase::Initializing);

        let known: HashSet<JobId> = jobs.iter().map(|j| j.index).collect();
        let ledger = self.store.open_or_init(jobs.len() as u64, &known)?;
        let pending = unprocessed(jobs, &ledger.completed_jobs);
        tracing::info!(
            total = jobs.len(),
            completed = ledger.completed_jobs.len(),
            pending = pending.len(),
            state_dir = %self.store.progress_path().display(),
            "ledger loaded"
        );

        let (handle, ledger_task) = LedgerHandle::spawn(self.store.clone(), ledger, known);
        let mut counts = RunCounts::default();

        self.set_phase(RunPhase::Running);
        if pending.is_empty() {
            let _ = handle.log("All jobs have already been processed");
        } else {
            let cursor = Arc::new(JobCursor::new(pending));
            let slots = self.workers.min(cursor.len()).max(1);
            let _ = handle.log(format!("Found {} unprocessed jobs", cursor.len()));
            let _ = handle.log(format!("Using {} parallel workers", slots));

            let mut join_set = tokio::task::JoinSet::new();
            for id in 1..=slots {
                let slot = WorkerSlot {
                    id,
                    cursor: Arc::clone(&cursor),
                    executor: Arc::clone(&self.executor),
                    ledger: handle.clone(),
                    shutdown: self.shutdown.clone(),
                    phase: Arc::clone(&self.phase),
                };
                join_set.spawn(slot.run());
            }
            while let Some(res) = join_set.join_next().await {
                match res {
                    Ok(slot_counts) => counts.merge(slot_counts),
                    Err(e) => tracing::error!(error = %e, "worker slot task failed"),
                }
            }
        }
        self.set_phase(RunPhase::Draining);

        let final_ledger = handle.finish().await?;
        let summary = RunSummary::new(
            &final_ledger,
            counts,
            started.elapsed(),
            self.shutdown.is_requested(),
        );
        for line in summary.lines() {
            let _ = handle.log(line);
        }
        drop(handle);
        if let Err(e) = ledger_task.await {
            tracing::warn!(error = %e, "ledger task ended abnormally");
        }

        self.set_phase(RunPhase::Completed);
        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            remaining = summary.remaining,
            elapsed = %format_elapsed(summary.elapsed),
            "run finished"
        );
        Ok(summary)
    }

    fn set_phase(&self, next: RunPhase) {
        self.phase.send_if_modified(|p| {
            if *p == next {
                false
            } else {
                tracing::debug!(from = ?*p, to = ?next, "run phase");
                *p = next;
                true
            }
        });
    }
}
