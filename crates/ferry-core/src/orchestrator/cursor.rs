//! Shared, monotonically advancing cursor over the unprocessed jobs.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::job::{Job, JobId};

/// One claimed job. `position` is 1-based within this run's unprocessed list.
#[derive(Debug, Clone)]
pub struct Claim {
    pub position: usize,
    pub total: usize,
    pub job: Job,
}

/// Workers pull from this; each index is handed out at most once.
#[derive(Debug)]
pub struct JobCursor {
    jobs: Vec<Job>,
    next: AtomicUsize,
}

impl JobCursor {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            jobs,
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Atomically claim the next job, or `None` once exhausted.
    pub fn claim(&self) -> Option<Claim> {
        let i = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.jobs.len()).then_some(n + 1)
            })
            .ok()?;
        Some(Claim {
            position: i + 1,
            total: self.jobs.len(),
            job: self.jobs[i].clone(),
        })
    }
}

/// `jobs − completed`, keeping list order.
pub fn unprocessed(jobs: &[Job], completed: &BTreeSet<JobId>) -> Vec<Job> {
    jobs.iter()
        .filter(|j| !completed.contains(&j.index))
        .cloned()
        .collect()
}
