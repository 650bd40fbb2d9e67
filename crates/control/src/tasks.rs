use crate::jobs::JobRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use study_index::{Embedder, IndexStore, RagIndex};
use study_ingest::{Extractor, UploadStore};
use study_metrics::{MetricsService, TracingService};
use study_models::{
    ChunkingConfig, JobManifest, JobStatus, JobUpdate, ManifestEntry, StudyError,
};
use tracing::{debug, instrument};

pub const MANIFEST_FILE: &str = "manifest.json";

struct Processed {
    chunks_indexed: usize,
    manifest_path: PathBuf,
}

/// Turns an upload folder into indexed chunks in the background.
#[derive(Clone)]
pub struct JobProcessor {
    jobs: JobRegistry,
    uploads: UploadStore,
    index: IndexStore,
    embedder: Arc<dyn Embedder>,
    extractor: Extractor,
    chunking: ChunkingConfig,
    metrics: Arc<MetricsService>,
}

impl JobProcessor {
    pub fn new(
        jobs: JobRegistry,
        uploads: UploadStore,
        index: IndexStore,
        embedder: Arc<dyn Embedder>,
        extractor: Extractor,
        chunking: ChunkingConfig,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            jobs,
            uploads,
            index,
            embedder,
            extractor,
            chunking,
            metrics,
        }
    }

    /// Run the whole pipeline for one job. Failures are recorded on the job
    /// rather than returned, and the `in/` folder is always removed.
    #[instrument(skip(self))]
    pub async fn process_job(&self, job_id: &str) {
        self.jobs
            .update_job(job_id, JobUpdate::status(JobStatus::Processing).with_progress(0));

        let update = match self.run(job_id).await {
            Ok(done) => {
                self.metrics.record_job_succeeded(done.chunks_indexed);
                TracingService::log_job_finished(job_id, JobStatus::Succeeded, done.chunks_indexed, None);
                JobUpdate {
                    status: Some(JobStatus::Succeeded),
                    progress: Some(100),
                    result_path: Some(done.manifest_path.to_string_lossy().into_owned()),
                    chunks_indexed: Some(done.chunks_indexed),
                    ..Default::default()
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.metrics.record_job_failed();
                TracingService::log_job_finished(job_id, JobStatus::Failed, 0, Some(&message));
                JobUpdate::failed(message)
            }
        };
        self.jobs.update_job(job_id, update);

        self.uploads.cleanup_job_in(job_id);
    }

    async fn run(&self, job_id: &str) -> Result<Processed, StudyError> {
        let in_dir = self.uploads.job_dir(job_id)?.join("in");
        if !in_dir.exists() {
            return Err(StudyError::NotFound {
                reason: "Input directory missing".to_string(),
            });
        }
        self.jobs.update_job(job_id, JobUpdate::progress(10));

        let extractor = self.extractor.clone();
        let walk_root = in_dir.clone();
        let files = tokio::task::spawn_blocking(move || {
            extractor.walk_and_extract(&[walk_root.clone()], Some(&walk_root))
        })
        .await
        .map_err(|e| StudyError::ExtractionError {
            reason: e.to_string(),
        })?;
        if files.is_empty() {
            return Err(StudyError::BadRequest {
                reason: "No text extracted from files".to_string(),
            });
        }
        self.jobs.update_job(job_id, JobUpdate::progress(40));

        let index = RagIndex::open(
            self.index.clone(),
            self.embedder.clone(),
            job_id,
            self.chunking.clone(),
        )
        .await?;

        let mut sources = Vec::with_capacity(files.len());
        let mut chunks_indexed = 0;
        for file in &files {
            let source = file.source();
            let chunks = index.add_document(job_id, &source, &file.text).await?;
            debug!("{} produced {} chunks", source, chunks);
            chunks_indexed += chunks;
            sources.push(ManifestEntry {
                source,
                chunks,
                chars: file.text.chars().count(),
            });
        }

        let manifest = JobManifest {
            job_id: job_id.to_string(),
            sources,
            chunks_indexed,
        };
        let manifest_path = self.uploads.job_out_dir(job_id)?.join(MANIFEST_FILE);
        let body = serde_json::to_vec_pretty(&manifest).map_err(|e| StudyError::InternalError {
            reason: e.to_string(),
        })?;
        tokio::fs::write(&manifest_path, body).await?;

        Ok(Processed {
            chunks_indexed,
            manifest_path,
        })
    }
}
