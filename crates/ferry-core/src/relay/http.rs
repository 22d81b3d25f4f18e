//! HTTP object-store relay: `HEAD` for existence, `PUT` for upload.
//!
//! Objects live at `{endpoint}/{bucket}/{key}`. Each upload carries the
//! artifact's SHA-256 in `x-amz-content-sha256`, so stores that check it
//! reject corrupted bodies.

use chrono::Utc;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str;
use std::time::Duration;

use super::{validate_key, Relay, RelayError, UploadOutcome};
use crate::checksum;
use crate::config::RelayConfig;

const CHECK_KEY: &str = "ferry-connection-check-key-that-does-not-exist";

#[derive(Debug, Clone)]
pub struct HttpRelay {
    base: url::Url,
    bucket: String,
    token: Option<String>,
    storage_class: Option<String>,
    limits: TransferLimits,
}

/// Connect timeout and low-speed abort applied to every request, so a store
/// that accepts a connection and then stops answering cannot hold a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    pub connect_timeout: Duration,
    pub low_speed_limit_bytes: u32,
    pub low_speed_time: Duration,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            low_speed_limit_bytes: 1024,
            low_speed_time: Duration::from_secs(120),
        }
    }
}

/// Status line and headers of a HEAD/PUT response.
struct Response {
    code: u32,
    headers: Vec<String>,
}

impl Response {
    fn header(&self, name: &str) -> Option<String> {
        self.headers.iter().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

impl From<&RelayConfig> for TransferLimits {
    fn from(cfg: &RelayConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit_bytes: cfg.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
        }
    }
}

impl HttpRelay {
    pub fn new(endpoint: &str, bucket: &str) -> Result<Self, RelayError> {
        let base = url::Url::parse(endpoint)
            .map_err(|e| RelayError::Config(format!("relay endpoint {endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(RelayError::Config(format!(
                "relay endpoint {endpoint} is not a base URL"
            )));
        }
        let bucket = bucket.trim_matches('/');
        if bucket.is_empty() {
            return Err(RelayError::Config("empty bucket name".to_string()));
        }
        Ok(Self {
            base,
            bucket: bucket.to_string(),
            token: None,
            storage_class: None,
            limits: TransferLimits::default(),
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_storage_class(mut self, storage_class: Option<String>) -> Self {
        self.storage_class = storage_class;
        self
    }

    pub fn with_limits(mut self, limits: TransferLimits) -> Self {
        self.limits = limits;
        self
    }

    /// `{endpoint}/{bucket}/{key}` with each segment percent-encoded.
    pub fn object_url(&self, key: &str) -> Result<url::Url, RelayError> {
        validate_key(key)?;
        let mut url = self.base.clone();
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| RelayError::Config("relay endpoint is not a base URL".to_string()))?;
            segs.pop_if_empty().push(&self.bucket);
            for seg in key.trim_start_matches('/').split('/') {
                segs.push(seg);
            }
        }
        Ok(url)
    }

    fn new_easy(&self, url: &url::Url, extra: &[String]) -> Result<curl::easy::Easy, RelayError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.connect_timeout(self.limits.connect_timeout)?;
        easy.low_speed_limit(self.limits.low_speed_limit_bytes)?;
        easy.low_speed_time(self.limits.low_speed_time)?;
        let mut list = curl::easy::List::new();
        if let Some(token) = &self.token {
            list.append(&format!("Authorization: Bearer {}", token))?;
        }
        for h in extra {
            list.append(h)?;
        }
        easy.http_headers(list)?;
        Ok(easy)
    }

    fn head(&self, url: &url::Url) -> Result<Response, RelayError> {
        let mut easy = self.new_easy(url, &[])?;
        easy.nobody(true)?;
        easy.timeout(Duration::from_secs(30))?;
        let mut headers = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.perform()?;
        }
        let code = easy.response_code()?;
        Ok(Response { code, headers })
    }

    fn put(&self, url: &url::Url, source: &Path, extra: &[String]) -> Result<Response, RelayError> {
        let mut file = File::open(source)?;
        let len = file.metadata()?.len();
        let mut easy = self.new_easy(url, extra)?;
        easy.upload(true)?;
        easy.in_filesize(len)?;
        let mut headers = Vec::new();
        let mut read_err: Option<std::io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer.read_function(|buf| match file.read(buf) {
                Ok(n) => Ok(n),
                Err(e) => {
                    read_err = Some(e);
                    Err(curl::easy::ReadError::Abort)
                }
            })?;
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            // Drain any response body so curl does not write it to stdout.
            transfer.write_function(|data| Ok(data.len()))?;
            transfer.perform()
        };
        if let Some(e) = read_err {
            return Err(RelayError::Io(e));
        }
        performed?;
        let code = easy.response_code()?;
        Ok(Response { code, headers })
    }
}

fn status_error(code: u32, bucket: &str) -> RelayError {
    match code {
        401 | 403 => RelayError::Auth(code),
        404 => RelayError::NoSuchStore(bucket.to_string()),
        _ => RelayError::Http(code),
    }
}

impl Relay for HttpRelay {
    fn exists(&self, key: &str) -> Result<bool, RelayError> {
        let url = self.object_url(key)?;
        let resp = self.head(&url)?;
        match resp.code {
            200..=299 => Ok(true),
            404 => Ok(false),
            code => Err(status_error(code, &self.bucket)),
        }
    }

    fn upload(
        &self,
        source: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<UploadOutcome, RelayError> {
        let url = self.object_url(key)?;
        let sha256 = checksum::sha256_path(source)?;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut extra = vec![
            format!("Content-Type: {}", content_type),
            format!("x-amz-content-sha256: {}", sha256),
            format!("x-amz-meta-original-file-name: {}", file_name),
            format!("x-amz-meta-uploaded-at: {}", Utc::now().to_rfc3339()),
            // Create-only: an object that appeared since the existence check
            // answers 412 instead of being overwritten.
            "If-None-Match: *".to_string(),
            // Avoid the 100-continue round trip on servers that ignore it.
            "Expect:".to_string(),
        ];
        if let Some(class) = &self.storage_class {
            extra.push(format!("x-amz-storage-class: {}", class));
        }

        let resp = self.put(&url, source, &extra)?;
        match resp.code {
            200..=299 => {
                let etag = resp.header("etag").map(|e| e.trim_matches('"').to_string());
                tracing::debug!(key, code = resp.code, "uploaded object");
                Ok(UploadOutcome::Uploaded { etag, sha256 })
            }
            409 | 412 => Ok(UploadOutcome::AlreadyExists),
            code => Err(status_error(code, &self.bucket)),
        }
    }

    fn check(&self) -> Result<(), RelayError> {
        let url = self.object_url(CHECK_KEY)?;
        let resp = self.head(&url)?;
        match resp.code {
            // Store reachable and credentials accepted; the key is expected to be absent.
            200..=299 | 404 => Ok(()),
            code => Err(match code {
                401 | 403 => RelayError::Auth(code),
                _ => RelayError::Http(code),
            }),
        }
    }
}
