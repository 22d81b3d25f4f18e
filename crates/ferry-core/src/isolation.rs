//! Isolation boundary: run one executor call in its own execution unit.
//!
//! Each dispatch spawns the blocking executor with `spawn_blocking` under a
//! small supervising task. Progress and the final outcome travel back over an
//! mpsc channel as [`JobEvent`]s: zero or more `Progress`, then exactly one
//! terminal `Succeeded` / `Failed`. A panic inside the unit becomes a
//! `Failed` event with [`FailureKind::WorkerFault`]; so does a channel that
//! closes without a terminal event.

use std::any::Any;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::executor::JobExecutor;
use crate::job::{FailureKind, Job, JobFailure, JobId, JobResult, WorkerId};

/// Message from an execution unit to its worker slot.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress { worker_id: WorkerId, message: String },
    Succeeded(JobResult),
    Failed(JobFailure),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress { .. })
    }
}

/// Receiving side of one dispatched job.
pub struct Dispatch {
    index: JobId,
    title: String,
    rx: mpsc::UnboundedReceiver<JobEvent>,
    finished: bool,
}

impl Dispatch {
    /// Next event, or `None` after the terminal event has been returned.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(event) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Some(event)
            }
            None => {
                self.finished = true;
                Some(JobEvent::Failed(
                    self.fault("execution unit exited without reporting an outcome"),
                ))
            }
        }
    }

    /// Drain to the terminal outcome, passing progress messages to `on_progress`.
    pub async fn outcome(
        mut self,
        mut on_progress: impl FnMut(String),
    ) -> Result<JobResult, JobFailure> {
        while let Some(event) = self.next_event().await {
            match event {
                JobEvent::Progress { message, .. } => on_progress(message),
                JobEvent::Succeeded(result) => return Ok(result),
                JobEvent::Failed(failure) => return Err(failure),
            }
        }
        Err(self.fault("outcome already consumed"))
    }

    fn fault(&self, reason: &str) -> JobFailure {
        JobFailure {
            index: self.index,
            title: self.title.clone(),
            kind: FailureKind::WorkerFault,
            error: reason.to_string(),
        }
    }
}

/// Dispatch `job` to a fresh execution unit on behalf of `worker_id`.
/// Must be called from within a tokio runtime.
pub fn dispatch(executor: Arc<JobExecutor>, job: Job, worker_id: WorkerId) -> Dispatch {
    let (tx, rx) = mpsc::unbounded_channel();
    let index = job.index;
    let title = job.title.clone();
    let supervisor_tx = tx.clone();
    let fault_title = title.clone();

    tokio::spawn(async move {
        let unit = tokio::task::spawn_blocking(move || {
            let sink = |message: String| {
                let _ = tx.send(JobEvent::Progress { worker_id, message });
            };
            executor.execute(&job, worker_id, &sink)
        });

        let terminal = match unit.await {
            Ok(Ok(result)) => JobEvent::Succeeded(result),
            Ok(Err(failure)) => JobEvent::Failed(JobFailure {
                index,
                title: fault_title,
                kind: FailureKind::Transfer,
                error: failure.to_string(),
            }),
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("worker panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    "worker was cancelled".to_string()
                };
                tracing::error!(job = index, worker_id, %reason, "execution unit terminated abnormally");
                JobEvent::Failed(JobFailure {
                    index,
                    title: fault_title,
                    kind: FailureKind::WorkerFault,
                    error: reason,
                })
            }
        };
        let _ = supervisor_tx.send(terminal);
    });

    Dispatch {
        index,
        title,
        rx,
        finished: false,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
