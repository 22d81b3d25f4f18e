//! Local-directory relay: objects are files under `root/<key>`.

use std::path::{Path, PathBuf};

use super::{validate_key, Relay, RelayError, UploadOutcome};
use crate::checksum;
use crate::storage;

#[derive(Debug, Clone)]
pub struct DirRelay {
    root: PathBuf,
}

impl DirRelay {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, RelayError> {
        validate_key(key)?;
        Ok(self.root.join(key.trim_start_matches('/')))
    }
}

impl Relay for DirRelay {
    fn exists(&self, key: &str) -> Result<bool, RelayError> {
        Ok(self.object_path(key)?.is_file())
    }

    fn upload(
        &self,
        source: &Path,
        key: &str,
        _content_type: &str,
    ) -> Result<UploadOutcome, RelayError> {
        let dest = self.object_path(key)?;
        if dest.is_file() {
            return Ok(UploadOutcome::AlreadyExists);
        }
        let sha256 = checksum::sha256_path(source)?;
        storage::copy_atomic(source, &dest)?;
        tracing::debug!(key, dest = %dest.display(), "stored object");
        Ok(UploadOutcome::Uploaded { etag: None, sha256 })
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(RelayError::NoSuchStore(self.root.display().to_string()))
        }
    }
}
