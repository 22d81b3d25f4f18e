//! CLI for ferry, the resumable fetch-and-relay batch driver.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use ferry_core::config::{self, FerryConfig};
use std::path::{Path, PathBuf};

use commands::{run_check_relay, run_completions, run_jobs, run_pending, run_status, RunOptions};

/// Top-level CLI for ferry.
#[derive(Debug, Parser)]
#[command(name = "ferry")]
#[command(about = "ferry: fetch media from source URLs and relay it to an object store, resumably", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/ferry/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Process every job in the list that is not yet completed.
    Run {
        /// JSON job list.
        jobs: PathBuf,
        /// Number of concurrent worker slots (default: max_workers from config).
        #[arg(long, short = 'w', value_name = "N")]
        workers: Option<usize>,
        /// Directory holding progress.json, completed.json and progress.log.
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,
        /// Directory for temporary download artifacts.
        #[arg(long, value_name = "DIR")]
        temp_dir: Option<PathBuf>,
    },

    /// Show the persisted progress ledger.
    Status {
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,
    },

    /// List jobs from the list that are not yet completed.
    Pending {
        /// JSON job list.
        jobs: PathBuf,
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,
    },

    /// Check the configured relay for reachability and credentials.
    CheckRelay,

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = cli.command {
            return run_completions(shell);
        }
        let cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                jobs,
                workers,
                state_dir,
                temp_dir,
            } => {
                let opts = RunOptions {
                    jobs_path: jobs,
                    workers: workers.unwrap_or(cfg.max_workers),
                    state_dir: resolve_state_dir(state_dir, &cfg)?,
                    temp_dir: temp_dir.unwrap_or_else(|| cfg.effective_temp_dir()),
                };
                run_jobs(&cfg, opts).await?
            }
            CliCommand::Status { state_dir } => run_status(&resolve_state_dir(state_dir, &cfg)?)?,
            CliCommand::Pending { jobs, state_dir } => {
                run_pending(&jobs, &resolve_state_dir(state_dir, &cfg)?)?
            }
            CliCommand::CheckRelay => run_check_relay(&cfg).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<FerryConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init().context("load ~/.config/ferry/config.toml"),
    }
}

fn resolve_state_dir(flag: Option<PathBuf>, cfg: &FerryConfig) -> Result<PathBuf> {
    match flag {
        Some(dir) => Ok(dir),
        None => cfg.effective_state_dir(),
    }
}

#[cfg(test)]
mod tests;
