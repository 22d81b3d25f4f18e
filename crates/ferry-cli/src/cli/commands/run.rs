//! `ferry run` – process the job list with a pool of worker slots.

use anyhow::{Context, Result};
use ferry_core::config::FerryConfig;
use ferry_core::control::ShutdownSignal;
use ferry_core::executor::JobExecutor;
use ferry_core::fetcher::CurlFetcher;
use ferry_core::job;
use ferry_core::ledger::LedgerStore;
use ferry_core::orchestrator::Orchestrator;
use ferry_core::relay;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub jobs_path: PathBuf,
    pub workers: usize,
    pub state_dir: PathBuf,
    pub temp_dir: PathBuf,
}

pub async fn run_jobs(cfg: &FerryConfig, opts: RunOptions) -> Result<()> {
    let jobs = job::load_jobs(&opts.jobs_path)
        .with_context(|| format!("load job list {}", opts.jobs_path.display()))?;
    let relay = relay::from_config(&cfg.relay).context("relay configuration")?;
    std::fs::create_dir_all(&opts.state_dir)
        .with_context(|| format!("create state dir {}", opts.state_dir.display()))?;

    let executor = JobExecutor::new(
        Arc::new(CurlFetcher::new(cfg.fetch.clone())),
        Arc::from(relay),
        opts.temp_dir.clone(),
    );
    let shutdown = ShutdownSignal::new();
    let orchestrator = Orchestrator::new(
        Arc::new(executor),
        LedgerStore::in_dir(&opts.state_dir),
        opts.workers,
    )
    .with_shutdown(shutdown.clone());

    tracing::info!(
        jobs = jobs.len(),
        workers = orchestrator.workers(),
        state_dir = %opts.state_dir.display(),
        temp_dir = %opts.temp_dir.display(),
        "starting run"
    );

    // First signal drains; a second one exits without waiting.
    let signals = tokio::spawn(async move {
        loop {
            wait_for_termination().await;
            if shutdown.request() {
                eprintln!("second shutdown request; exiting without waiting for in-flight jobs");
                tracing::warn!("forced exit on repeated shutdown request");
                std::process::exit(130);
            }
            eprintln!("shutdown requested; letting in-flight jobs finish (signal again to exit now)");
            tracing::info!("shutdown requested; no further jobs will be claimed");
        }
    });

    let result = orchestrator.run(&jobs).await;
    signals.abort();
    let summary = result.context("initialize progress ledger")?;

    print!("{}", summary);
    Ok(())
}

/// Resolves on SIGINT or (on unix) SIGTERM.
async fn wait_for_termination() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => ctrl_c.await,
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
