//! `ferry check-relay` – check the configured relay.

use anyhow::{Context, Result};
use ferry_core::config::{FerryConfig, RelayKind};
use ferry_core::relay;

pub async fn run_check_relay(cfg: &FerryConfig) -> Result<()> {
    let relay = relay::from_config(&cfg.relay).context("relay configuration")?;
    tokio::task::spawn_blocking(move || relay.check())
        .await
        .context("relay check task")?
        .context("relay check failed")?;

    match cfg.relay.kind {
        RelayKind::Http => println!(
            "Relay OK: bucket {} at {}",
            cfg.relay.effective_bucket().unwrap_or_default(),
            cfg.relay.endpoint.as_deref().unwrap_or("-")
        ),
        RelayKind::Dir => println!(
            "Relay OK: directory {}",
            cfg.relay
                .root
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
    }
    Ok(())
}
