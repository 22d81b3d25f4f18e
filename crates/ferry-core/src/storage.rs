//! Local file lifecycle: job-scoped temp artifacts and atomic replacement.
//!
//! Every persisted document is written to a `.part` sibling, synced, then
//! renamed over the target, so a crash leaves either the previous document
//! or the new one, never a mix.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::job::{JobId, WorkerId};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Path for the temp file: appends `.part` to the final path (e.g. `file.json` → `file.json.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Collision-free artifact path for one job invocation:
/// `<dir>/w<worker>_<job>_<millis>_<seq>.<ext>`.
///
/// Partitioned by worker and job so concurrent workers never share a path;
/// the time and process-wide sequence keep re-dispatches distinct too.
pub fn artifact_path(dir: &Path, worker_id: WorkerId, job: JobId, extension: Option<&str>) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = format!("w{worker_id}_{job}_{millis}_{seq}");
    if let Some(ext) = extension.filter(|e| !e.is_empty()) {
        name.push('.');
        name.push_str(ext);
    }
    dir.join(name)
}

/// Replace `path` with `bytes` via temp file + fsync + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let result = (|| {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Copy `src` to `dst` via temp file + fsync + rename. Returns bytes copied.
pub fn copy_atomic(src: &Path, dst: &Path) -> io::Result<u64> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(dst);
    let result = (|| {
        let mut input = File::open(src)?;
        let mut out = File::create(&tmp)?;
        let n = io::copy(&mut input, &mut out)?;
        out.sync_all()?;
        fs::rename(&tmp, dst)?;
        Ok(n)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Remove a file, ignoring "not found". Other failures are logged and
/// swallowed; returns whether the path is gone.
pub fn remove_best_effort(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "temp file cleanup failed");
            false
        }
    }
}

/// Removes the wrapped path when dropped (success, error or unwind).
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        remove_best_effort(&self.path);
    }
}
