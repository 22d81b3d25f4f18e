//! CLI command handlers, one per file.

mod check_relay;
mod completions;
mod pending;
mod run;
mod status;

pub use check_relay::run_check_relay;
pub use completions::run_completions;
pub use pending::run_pending;
pub use run::{run_jobs, RunOptions};
pub use status::run_status;
