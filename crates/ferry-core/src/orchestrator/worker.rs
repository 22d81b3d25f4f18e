//! One worker slot: claim, dispatch, report, repeat until the cursor runs dry.

use std::sync::Arc;
use tokio::sync::watch;

use super::cursor::JobCursor;
use super::summary::RunCounts;
use super::RunPhase;
use crate::control::ShutdownSignal;
use crate::error::LedgerError;
use crate::executor::JobExecutor;
use crate::isolation;
use crate::job::WorkerId;
use crate::ledger::LedgerHandle;

/// Slot lifecycle. `Drained` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    ClaimingJob,
    Dispatched,
    Succeeded,
    Failed,
    Drained,
}

pub(super) struct WorkerSlot {
    pub id: WorkerId,
    pub cursor: Arc<JobCursor>,
    pub executor: Arc<JobExecutor>,
    pub ledger: LedgerHandle,
    pub shutdown: ShutdownSignal,
    pub phase: Arc<watch::Sender<RunPhase>>,
}

impl WorkerSlot {
    pub async fn run(self) -> RunCounts {
        let mut counts = RunCounts::default();
        let mut state = SlotState::Idle;
        note(self.ledger.adjust_active_workers(1));

        loop {
            state = self.transition(state, SlotState::ClaimingJob);
            if self.shutdown.is_requested() {
                note(self.ledger.log(format!(
                    "Worker {}: shutdown requested, not claiming more jobs",
                    self.id
                )));
                break;
            }
            let Some(claim) = self.cursor.claim() else {
                break;
            };
            let label = claim.job.label();
            note(self.ledger.log(format!(
                "Worker {}: Starting {} ({}/{})",
                self.id, label, claim.position, claim.total
            )));

            state = self.transition(state, SlotState::Dispatched);
            counts.dispatched += 1;
            let ledger = self.ledger.clone();
            let outcome = isolation::dispatch(Arc::clone(&self.executor), claim.job, self.id)
                .outcome(|message| note(ledger.log(message)))
                .await;

            match outcome {
                Ok(result) => {
                    state = self.transition(state, SlotState::Succeeded);
                    counts.succeeded += 1;
                    let line = if result.skipped {
                        counts.skipped += 1;
                        format!("Worker {}: Skipped {} (already present)", self.id, label)
                    } else {
                        format!("Worker {}: Completed {}", self.id, label)
                    };
                    note(self.ledger.log(line));
                    note(self.ledger.record_completion(result));
                }
                Err(failure) => {
                    state = self.transition(state, SlotState::Failed);
                    counts.failed += 1;
                    note(self.ledger.log(format!(
                        "Worker {}: Failed {} - {}",
                        self.id, failure.title, failure.error
                    )));
                    note(self.ledger.record_failure(failure));
                }
            }
            state = self.transition(state, SlotState::Idle);
        }

        // First slot to stop claiming moves the run into draining.
        self.phase.send_if_modified(|p| {
            if *p == RunPhase::Running {
                *p = RunPhase::Draining;
                true
            } else {
                false
            }
        });
        self.transition(state, SlotState::Drained);
        note(self.ledger.adjust_active_workers(-1));
        counts
    }

    fn transition(&self, from: SlotState, to: SlotState) -> SlotState {
        tracing::debug!(worker_id = self.id, ?from, ?to, "slot state");
        to
    }
}

// Sends only fail once the ledger task is gone; nothing useful to do but say so.
fn note(result: Result<(), LedgerError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "ledger update dropped");
    }
}
