//! Durable, crash-recoverable progress ledger.
//!
//! Two JSON documents under the state directory: `progress.json` (counts,
//! timestamps, completed ids) and `completed.json` (the completed-id list,
//! authoritative for resumption). Both are replaced atomically on every write.
//! A rolling `progress.log` holds timestamped human-readable lines.

mod actor;
mod store;
mod types;

pub use actor::LedgerHandle;
pub use store::{LedgerStore, COMPLETED_FILE, LOG_FILE, PROGRESS_FILE};
pub use types::ProgressLedger;
