//! Persisted progress aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::job::JobId;

/// Counts, timestamps and the completed-identifier set for one job list.
///
/// `processed_count` is always derived from `completed_jobs`, so the two
/// agree whenever the document is at rest. `failed_count` accumulates across
/// runs; failed jobs are retried by the next run because they never enter
/// the completed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLedger {
    #[serde(alias = "totalEpisodes")]
    pub total_jobs: u64,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub active_workers: u64,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "completedEpisodes")]
    pub completed_jobs: BTreeSet<JobId>,
}

impl ProgressLedger {
    pub fn new(total_jobs: u64) -> Self {
        let now = Utc::now();
        Self {
            total_jobs,
            processed_count: 0,
            failed_count: 0,
            active_workers: 0,
            start_time: now,
            last_updated: now,
            end_time: None,
            completed_jobs: BTreeSet::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Add `id` to the completed set. Returns false if it was already there.
    pub fn record_completion(&mut self, id: JobId) -> bool {
        let inserted = self.completed_jobs.insert(id);
        self.processed_count = self.completed_jobs.len() as u64;
        self.touch();
        inserted
    }

    pub fn record_failure(&mut self) {
        self.failed_count += 1;
        self.touch();
    }

    pub fn adjust_active_workers(&mut self, delta: i64) {
        self.active_workers = if delta >= 0 {
            self.active_workers.saturating_add(delta as u64)
        } else {
            self.active_workers.saturating_sub(delta.unsigned_abs())
        };
        self.touch();
    }

    /// Stamp the end of a run.
    pub fn finish(&mut self) {
        self.active_workers = 0;
        self.touch();
        self.end_time = Some(self.last_updated);
    }

    pub fn remaining(&self) -> u64 {
        self.total_jobs.saturating_sub(self.processed_count)
    }
}
