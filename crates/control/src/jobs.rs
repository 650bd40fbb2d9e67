use dashmap::DashMap;
use std::sync::Arc;
use study_models::{Job, JobUpdate};
use tracing::debug;

/// In-memory job table shared by the API and the background tasks.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a PENDING job, replacing any previous job with that id.
    pub fn create_job(&self, job_id: &str) -> Job {
        let job = Job::new(job_id);
        self.jobs.insert(job_id.to_string(), job.clone());
        debug!("Created job {}", job_id);
        job
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }

    /// Merge the given fields and bump `updated_at`. `None` for unknown ids.
    pub fn update_job(&self, job_id: &str, update: JobUpdate) -> Option<Job> {
        let mut entry = self.jobs.get_mut(job_id)?;
        entry.apply(update);
        Some(entry.value().clone())
    }

    pub fn remove_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.remove(job_id).map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_models::JobStatus;

    #[test]
    fn update_merges_and_bumps_timestamp() {
        let jobs = JobRegistry::new();
        let created = jobs.create_job("j1");
        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = jobs
            .update_job("j1", JobUpdate::status(JobStatus::Processing).with_progress(10))
            .unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
        assert_eq!(updated.progress, 10);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(jobs.get_job("j1").unwrap(), updated);
    }

    #[test]
    fn unknown_jobs() {
        let jobs = JobRegistry::new();
        assert!(jobs.get_job("nope").is_none());
        assert!(jobs.update_job("nope", JobUpdate::progress(5)).is_none());
        assert!(jobs.is_empty());
    }

    #[test]
    fn clones_share_the_table() {
        let jobs = JobRegistry::new();
        let other = jobs.clone();
        jobs.create_job("shared");
        assert_eq!(other.len(), 1);
        assert!(other.remove_job("shared").is_some());
        assert!(jobs.get_job("shared").is_none());
    }
}
