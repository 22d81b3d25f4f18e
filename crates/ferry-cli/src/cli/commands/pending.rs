//! `ferry pending` – list jobs not yet in the completed set.

use anyhow::{Context, Result};
use ferry_core::job;
use ferry_core::ledger::LedgerStore;
use ferry_core::orchestrator::unprocessed;
use std::path::Path;

pub fn run_pending(jobs_path: &Path, state_dir: &Path) -> Result<()> {
    let jobs = job::load_jobs(jobs_path)
        .with_context(|| format!("load job list {}", jobs_path.display()))?;
    let store = LedgerStore::in_dir(state_dir);
    let completed = match store.load_completed()? {
        Some(set) => set,
        None => store.load()?.map(|l| l.completed_jobs).unwrap_or_default(),
    };

    let pending = unprocessed(&jobs, &completed);
    if pending.is_empty() {
        println!("All {} jobs have already been processed.", jobs.len());
        return Ok(());
    }
    println!("{:<8} {:<40} {}", "INDEX", "TITLE", "DESTINATION");
    for j in &pending {
        println!("{:<8} {:<40} {}", j.index, j.label(), j.s3_path);
    }
    println!("{} of {} jobs pending.", pending.len(), jobs.len());
    Ok(())
}
