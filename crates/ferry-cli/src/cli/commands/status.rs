//! `ferry status` – show the persisted progress ledger.

use anyhow::Result;
use ferry_core::ledger::LedgerStore;
use std::path::Path;

pub fn run_status(state_dir: &Path) -> Result<()> {
    let store = LedgerStore::in_dir(state_dir);
    let Some(ledger) = store.load()? else {
        println!("No progress recorded in {}.", state_dir.display());
        return Ok(());
    };
    let completed = store
        .load_completed()?
        .map(|set| set.len())
        .unwrap_or(ledger.completed_jobs.len());

    println!("{:<16} {}", "Total jobs:", ledger.total_jobs);
    println!("{:<16} {}", "Processed:", ledger.processed_count);
    println!("{:<16} {}", "Failed:", ledger.failed_count);
    println!("{:<16} {}", "Remaining:", ledger.remaining());
    println!("{:<16} {}", "Completed ids:", completed);
    println!("{:<16} {}", "Active workers:", ledger.active_workers);
    println!("{:<16} {}", "Started:", ledger.start_time.to_rfc3339());
    println!("{:<16} {}", "Last updated:", ledger.last_updated.to_rfc3339());
    match ledger.end_time {
        Some(end) => println!("{:<16} {}", "Finished:", end.to_rfc3339()),
        None => println!("{:<16} {}", "Finished:", "-"),
    }
    Ok(())
}
