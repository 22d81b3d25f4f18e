//! Fetcher collaborator: stream a remote object to a local path.
//!
//! [`CurlFetcher`] does a single GET (following redirects) and writes the body
//! sequentially to the destination. It is blocking; the isolation boundary
//! runs it inside `spawn_blocking`.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::config::FetchConfig;

/// Error from a fetch. `Network` covers DNS/connect/timeout/transfer faults.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network: {0}")]
    Network(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Streams `source` into `destination` (created or truncated).
pub trait Fetcher: Send + Sync {
    fn fetch(&self, source: &str, destination: &Path) -> Result<(), FetchError>;
}

/// libcurl GET fetcher. No overall timeout: large transfers may take as long
/// as they need; stalled ones are aborted by the low-speed limit.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    cfg: FetchConfig,
}

impl CurlFetcher {
    pub fn new(cfg: FetchConfig) -> Self {
        Self { cfg }
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, source: &str, destination: &Path) -> Result<(), FetchError> {
        let mut file = File::create(destination)?;
        let mut write_err: Option<std::io::Error> = None;

        let mut easy = curl::easy::Easy::new();
        easy.url(source)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(Duration::from_secs(self.cfg.connect_timeout_secs))?;
        easy.low_speed_limit(self.cfg.low_speed_limit_bytes)?;
        easy.low_speed_time(Duration::from_secs(self.cfg.low_speed_time_secs))?;
        easy.fail_on_error(false)?;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| match file.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    write_err = Some(e);
                    Ok(0) // abort transfer
                }
            })?;
            transfer.perform()
        };

        if let Some(e) = write_err {
            return Err(FetchError::Io(e));
        }
        performed?;

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
