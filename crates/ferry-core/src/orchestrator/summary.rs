//! End-of-run summary (totals, failures, remaining, elapsed).

use std::fmt;
use std::time::Duration;

use crate::ledger::ProgressLedger;

/// Counts for the jobs dispatched in this run only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub dispatched: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunCounts {
    pub fn merge(&mut self, other: RunCounts) {
        self.dispatched += other.dispatched;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Ledger totals plus this run's counts.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total_jobs: u64,
    pub processed: u64,
    /// Cumulative across runs, as recorded in the ledger.
    pub failed: u64,
    pub remaining: u64,
    pub this_run: RunCounts,
    pub elapsed: Duration,
    /// Stopped early on a shutdown request.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new(ledger: &ProgressLedger, this_run: RunCounts, elapsed: Duration, interrupted: bool) -> Self {
        Self {
            total_jobs: ledger.total_jobs,
            processed: ledger.processed_count,
            failed: ledger.failed_count,
            remaining: ledger.remaining(),
            this_run,
            elapsed,
            interrupted,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![if self.interrupted {
            "Processing interrupted; in-flight jobs settled.".to_string()
        } else {
            "Processing completed!".to_string()
        }];
        lines.push("Final Statistics:".to_string());
        lines.push(format!("   Total jobs: {}", self.total_jobs));
        lines.push(format!("   Successfully processed: {}", self.processed));
        lines.push(format!("   Failed: {}", self.failed));
        lines.push(format!("   Remaining: {}", self.remaining));
        lines.push(format!(
            "   This run: {} dispatched, {} uploaded, {} already present, {} failed",
            self.this_run.dispatched,
            self.this_run.succeeded.saturating_sub(self.this_run.skipped),
            self.this_run.skipped,
            self.this_run.failed
        ));
        lines.push(format!("   Total time: {}", format_elapsed(self.elapsed)));
        lines
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// `Xm Ys`.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}
