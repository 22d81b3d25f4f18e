use ferry_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // File logging under the XDG state dir; stderr if that is not writable.
    match logging::init_logging() {
        Ok(path) => tracing::debug!(log = %path.display(), "file logging active"),
        Err(e) => {
            logging::init_logging_stderr();
            tracing::warn!("file logging unavailable ({:#}); logging to stderr", e);
        }
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("ferry error: {:#}", err);
        std::process::exit(1);
    }
}
