//! Static job list: immutable descriptors loaded once per run.
//!
//! The list is a JSON array of objects with camelCase keys. Keys other than
//! the known fields are kept verbatim as passthrough metadata and copied onto
//! every [`JobResult`] produced for the job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::JobListError;

/// Stable job identity across runs.
pub type JobId = u64;

/// Worker slot identity (1-based).
pub type WorkerId = usize;

/// Passthrough metadata carried from the job list into results.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One unit of work: fetch `download_url`, relay it to `s3_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub index: JobId,
    pub title: String,
    pub download_url: String,
    pub s3_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_episode_number: Option<u64>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Job {
    /// Label used in progress lines: `title (Episode N)` when the number is known.
    pub fn label(&self) -> String {
        match self.global_episode_number {
            Some(n) => format!("{} (Episode {})", self.title, n),
            None => self.title.clone(),
        }
    }
}

/// Outcome of a successful executor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub index: JobId,
    pub title: String,
    pub download_url: String,
    pub s3_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_episode_number: Option<u64>,
    pub worker_id: WorkerId,
    pub processed_at: DateTime<Utc>,
    /// Destination already existed; nothing was fetched or uploaded.
    pub skipped: bool,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl JobResult {
    pub fn for_job(job: &Job, worker_id: WorkerId, skipped: bool) -> Self {
        Self {
            index: job.index,
            title: job.title.clone(),
            download_url: job.download_url.clone(),
            s3_path: job.s3_path.clone(),
            global_episode_number: job.global_episode_number,
            worker_id,
            processed_at: Utc::now(),
            skipped,
            metadata: job.metadata.clone(),
        }
    }
}

/// Why a job did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Fetch or relay reported an error.
    Transfer,
    /// The isolated execution unit terminated abnormally.
    WorkerFault,
}

/// A job that failed in this run. Never retried within the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub index: JobId,
    pub title: String,
    pub kind: FailureKind,
    pub error: String,
}

/// Parse a job list from JSON text and validate it.
pub fn parse_jobs(data: &str) -> Result<Vec<Job>, JobListError> {
    let jobs: Vec<Job> = serde_json::from_str(data)?;
    validate(&jobs)?;
    Ok(jobs)
}

/// Load and validate the static job list from a JSON file.
pub fn load_jobs(path: &Path) -> Result<Vec<Job>, JobListError> {
    let data = std::fs::read_to_string(path).map_err(|source| JobListError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_jobs(&data)
}

fn validate(jobs: &[Job]) -> Result<(), JobListError> {
    let mut seen = HashSet::with_capacity(jobs.len());
    for job in jobs {
        if !seen.insert(job.index) {
            return Err(JobListError::DuplicateIndex(job.index));
        }
        let parsed = url::Url::parse(&job.download_url).map_err(|e| JobListError::InvalidUrl {
            index: job.index,
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(JobListError::InvalidUrl {
                index: job.index,
                reason: "not a hierarchical URL".to_string(),
            });
        }
        if job.s3_path.trim().is_empty() {
            return Err(JobListError::EmptyDestination(job.index));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "index": 0,
            "title": "Pilot",
            "downloadUrl": "https://cdn.example.com/s1/e1.mp4",
            "s3Path": "shows/s1/e1.mp4",
            "globalEpisodeNumber": 1,
            "season": 1,
            "quality": "1080p"
        },
        {
            "index": 1,
            "title": "Second",
            "downloadUrl": "https://cdn.example.com/s1/e2.mp4",
            "s3Path": "shows/s1/e2.mp4"
        }
    ]"#;

    #[test]
    fn parse_keeps_passthrough_metadata() {
        let jobs = parse_jobs(SAMPLE).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].index, 0);
        assert_eq!(jobs[0].global_episode_number, Some(1));
        assert_eq!(jobs[0].metadata.get("season"), Some(&serde_json::json!(1)));
        assert_eq!(jobs[0].metadata.get("quality"), Some(&serde_json::json!("1080p")));
        assert!(!jobs[0].metadata.contains_key("title"));
        assert_eq!(jobs[1].global_episode_number, None);
        assert!(jobs[1].metadata.is_empty());
    }

    #[test]
    fn label_includes_episode_number() {
        let jobs = parse_jobs(SAMPLE).unwrap();
        assert_eq!(jobs[0].label(), "Pilot (Episode 1)");
        assert_eq!(jobs[1].label(), "Second");
    }

    #[test]
    fn duplicate_index_rejected() {
        let data = r#"[
            {"index": 3, "title": "a", "downloadUrl": "https://x/a", "s3Path": "a"},
            {"index": 3, "title": "b", "downloadUrl": "https://x/b", "s3Path": "b"}
        ]"#;
        match parse_jobs(data) {
            Err(JobListError::DuplicateIndex(3)) => {}
            other => panic!("expected DuplicateIndex, got {:?}", other),
        }
    }

    #[test]
    fn relative_url_rejected() {
        let data = r#"[{"index": 0, "title": "a", "downloadUrl": "/a.mp4", "s3Path": "a"}]"#;
        assert!(matches!(
            parse_jobs(data),
            Err(JobListError::InvalidUrl { index: 0, .. })
        ));
    }

    #[test]
    fn empty_destination_rejected() {
        let data = r#"[{"index": 0, "title": "a", "downloadUrl": "https://x/a", "s3Path": " "}]"#;
        assert!(matches!(parse_jobs(data), Err(JobListError::EmptyDestination(0))));
    }

    #[test]
    fn result_carries_metadata_and_skip_flag() {
        let jobs = parse_jobs(SAMPLE).unwrap();
        let r = JobResult::for_job(&jobs[0], 4, true);
        assert_eq!(r.index, 0);
        assert_eq!(r.worker_id, 4);
        assert!(r.skipped);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["quality"], "1080p");
        assert_eq!(v["s3Path"], "shows/s1/e1.mp4");
        assert_eq!(v["workerId"], 4);
    }
}
