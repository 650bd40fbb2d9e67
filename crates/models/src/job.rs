use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub file_path: Option<String>,
    pub result_path: Option<String>,
    pub error: Option<String>,
    pub chunks_indexed: usize,
    /// Unix seconds.
    pub created_at: f64,
    pub updated_at: f64,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: 0,
            file_path: None,
            result_path: None,
            error: None,
            chunks_indexed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(file_path) = update.file_path {
            self.file_path = Some(file_path);
        }
        if let Some(result_path) = update.result_path {
            self.result_path = Some(result_path);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(chunks) = update.chunks_indexed {
            self.chunks_indexed = chunks;
        }
        self.updated_at = unix_now();
    }
}

/// Partial update of a job; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub file_path: Option<String>,
    pub result_path: Option<String>,
    pub error: Option<String>,
    pub chunks_indexed: Option<usize>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    pub progress: u8,
    #[serde(rename = "resultUrl")]
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status,
            progress: job.progress,
            result_url: job
                .result_path
                .as_ref()
                .map(|_| format!("/jobs/{}/result", job.id)),
            error: job.error.clone(),
        }
    }
}

/// Written to `<job>/out/manifest.json` once a job is indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobManifest {
    pub job_id: String,
    pub sources: Vec<ManifestEntry>,
    pub chunks_indexed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub source: String,
    pub chunks: usize,
    pub chars: usize,
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending() {
        let job = Job::new("abc");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.created_at > 0.0);
    }

    #[test]
    fn apply_merges_only_given_fields() {
        let mut job = Job::new("abc");
        job.apply(JobUpdate::status(JobStatus::Processing).with_progress(40));
        job.apply(JobUpdate::failed("boom"));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 40);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn status_response_links_result_only_when_present() {
        let mut job = Job::new("abc");
        let body = serde_json::to_value(JobStatusResponse::from(&job)).unwrap();
        assert_eq!(body["status"], "PENDING");
        assert!(body["resultUrl"].is_null());

        job.result_path = Some("/tmp/x".to_string());
        let body = serde_json::to_value(JobStatusResponse::from(&job)).unwrap();
        assert_eq!(body["resultUrl"], "/jobs/abc/result");
    }
}
