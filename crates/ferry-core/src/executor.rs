//! Job executor: fetch → relay → cleanup for a single job.
//!
//! Blocking; the isolation boundary runs it inside `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{TransferFailure, TransferStage};
use crate::fetcher::Fetcher;
use crate::job::{Job, JobResult, WorkerId};
use crate::relay::{content_type_for, Relay, UploadOutcome};
use crate::storage::{self, TempFileGuard};

/// Runs the transfer pipeline for one job using shared collaborators.
pub struct JobExecutor {
    fetcher: Arc<dyn Fetcher>,
    relay: Arc<dyn Relay>,
    temp_dir: PathBuf,
}

impl JobExecutor {
    pub fn new(fetcher: Arc<dyn Fetcher>, relay: Arc<dyn Relay>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            relay,
            temp_dir: temp_dir.into(),
        }
    }

    /// Execute `job` as worker `worker_id`. `progress` receives human-readable
    /// step messages.
    ///
    /// If the destination already exists, nothing is fetched and the result is
    /// marked `skipped`. The temp artifact is removed on every path.
    pub fn execute(
        &self,
        job: &Job,
        worker_id: WorkerId,
        progress: &dyn Fn(String),
    ) -> Result<JobResult, TransferFailure> {
        let key = job.s3_path.as_str();

        if self
            .relay
            .exists(key)
            .map_err(|e| TransferFailure::new(job.index, TransferStage::Relay, e))?
        {
            progress(format!(
                "Worker {}: {} already present at {}, skipping",
                worker_id,
                job.label(),
                key
            ));
            return Ok(JobResult::for_job(job, worker_id, true));
        }

        std::fs::create_dir_all(&self.temp_dir)
            .map_err(|e| TransferFailure::new(job.index, TransferStage::Prepare, e))?;
        let extension = Path::new(key).extension().and_then(|e| e.to_str());
        let artifact = TempFileGuard::new(storage::artifact_path(
            &self.temp_dir,
            worker_id,
            job.index,
            extension,
        ));

        progress(format!(
            "Worker {}: Starting download for {}",
            worker_id,
            job.label()
        ));
        self.fetcher
            .fetch(&job.download_url, artifact.path())
            .map_err(|e| TransferFailure::new(job.index, TransferStage::Fetch, e))?;
        progress(format!(
            "Worker {}: Download completed for {}",
            worker_id, job.title
        ));

        progress(format!(
            "Worker {}: Starting upload for {}",
            worker_id, job.title
        ));
        let content_type = content_type_for(artifact.path());
        let outcome = self
            .relay
            .upload(artifact.path(), key, content_type)
            .map_err(|e| TransferFailure::new(job.index, TransferStage::Relay, e))?;

        let skipped = match outcome {
            UploadOutcome::Uploaded { etag, sha256 } => {
                tracing::debug!(
                    job = job.index,
                    worker_id,
                    key,
                    sha256 = %sha256,
                    etag = etag.as_deref().unwrap_or("-"),
                    "upload complete"
                );
                false
            }
            UploadOutcome::AlreadyExists => {
                progress(format!(
                    "Worker {}: {} appeared at {} during transfer, skipping upload",
                    worker_id, job.title, key
                ));
                true
            }
        };
        drop(artifact);
        Ok(JobResult::for_job(job, worker_id, skipped))
    }
}
