use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `relay.bucket`.
pub const BUCKET_ENV: &str = "FERRY_BUCKET";

/// Default env var holding the relay bearer token.
pub const DEFAULT_TOKEN_ENV: &str = "FERRY_RELAY_TOKEN";

/// Fetcher tuning (optional `[fetch]` section in config.toml).
///
/// No total transfer timeout is applied; only a connect timeout and a
/// low-speed abort so a dead connection does not hang a worker forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    /// Abort if throughput stays below this many bytes/sec ...
    pub low_speed_limit_bytes: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 120,
        }
    }
}

/// Relay backend: HTTP object store (HEAD/PUT) or a local directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    #[default]
    Http,
    Dir,
}

/// Relay-uploader settings (`[relay]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub kind: RelayKind,
    /// Base URL of the object store, e.g. `https://s3.ap-south-2.amazonaws.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bucket (first path segment under `endpoint`). `FERRY_BUCKET` wins if set.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Storage class header sent with each upload; `None` omits it.
    #[serde(default = "default_storage_class")]
    pub storage_class: Option<String>,
    /// Name of the env var holding a bearer token for the store.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Root directory for `kind = "dir"`.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_relay_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Abort an upload whose throughput stays below this many bytes/sec ...
    #[serde(default = "default_low_speed_limit")]
    pub low_speed_limit_bytes: u32,
    /// ... for this many seconds (covers a store that stops answering).
    #[serde(default = "default_low_speed_time")]
    pub low_speed_time_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            kind: RelayKind::Http,
            endpoint: None,
            bucket: None,
            storage_class: default_storage_class(),
            token_env: None,
            root: None,
            connect_timeout_secs: default_relay_connect_timeout(),
            low_speed_limit_bytes: default_low_speed_limit(),
            low_speed_time_secs: default_low_speed_time(),
        }
    }
}

fn default_relay_connect_timeout() -> u64 {
    15
}

fn default_low_speed_limit() -> u32 {
    1024
}

fn default_low_speed_time() -> u64 {
    120
}

fn default_storage_class() -> Option<String> {
    Some("GLACIER_IR".to_string())
}

impl RelayConfig {
    /// Bucket after applying the `FERRY_BUCKET` override.
    pub fn effective_bucket(&self) -> Option<String> {
        std::env::var(BUCKET_ENV)
            .ok()
            .filter(|b| !b.trim().is_empty())
            .or_else(|| self.bucket.clone())
    }

    /// Bearer token read from `token_env` (or `FERRY_RELAY_TOKEN`), if set.
    pub fn token(&self) -> Option<String> {
        let var = self.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
        std::env::var(var).ok().filter(|t| !t.is_empty())
    }
}

/// Global configuration loaded from `~/.config/ferry/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FerryConfig {
    /// Number of concurrent worker slots.
    pub max_workers: usize,
    /// Directory for job-scoped temporary artifacts (None = `$TMPDIR/ferry`).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    /// Directory holding the ledger documents (None = XDG state dir).
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            temp_dir: None,
            state_dir: None,
            fetch: FetchConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl FerryConfig {
    /// Temp directory for artifacts, falling back to `$TMPDIR/ferry`.
    pub fn effective_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ferry"))
    }

    /// State directory for the ledger, falling back to `~/.local/state/ferry`.
    pub fn effective_state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_state_dir(),
        }
    }
}

/// `~/.local/state/ferry` (XDG state home).
pub fn default_state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ferry")?;
    Ok(xdg_dirs.get_state_home())
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ferry")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FerryConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FerryConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file (no default is written).
pub fn load_from_path(path: &Path) -> Result<FerryConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: FerryConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
