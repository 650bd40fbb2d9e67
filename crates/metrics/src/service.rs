use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
use study_models::StudyError;
use tracing::debug;

fn metric_error(e: prometheus::Error) -> StudyError {
    StudyError::InternalError {
        reason: e.to_string(),
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter, StudyError> {
    let counter = Counter::new(name, help).map_err(metric_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metric_error)?;
    Ok(counter)
}

pub struct MetricsService {
    registry: Registry,
    uploads_total: Counter,
    uploaded_bytes_total: Counter,
    jobs_succeeded_total: Counter,
    jobs_failed_total: Counter,
    chunks_indexed_total: Counter,
    quizzes_generated_total: Counter,
    failed_logins_total: Counter,
    quiz_generation_seconds: Histogram,
}

impl MetricsService {
    pub fn new() -> Result<Self, StudyError> {
        let registry = Registry::new();

        let uploads_total = counter(
            &registry,
            "studyforge_uploads_total",
            "Total number of accepted uploads",
        )?;
        let uploaded_bytes_total = counter(
            &registry,
            "studyforge_uploaded_bytes_total",
            "Total bytes written by accepted uploads",
        )?;
        let jobs_succeeded_total = counter(
            &registry,
            "studyforge_jobs_succeeded_total",
            "Total number of processing jobs that succeeded",
        )?;
        let jobs_failed_total = counter(
            &registry,
            "studyforge_jobs_failed_total",
            "Total number of processing jobs that failed",
        )?;
        let chunks_indexed_total = counter(
            &registry,
            "studyforge_chunks_indexed_total",
            "Total number of chunks written to the retrieval index",
        )?;
        let quizzes_generated_total = counter(
            &registry,
            "studyforge_quizzes_generated_total",
            "Total number of generated quizzes",
        )?;
        let failed_logins_total = counter(
            &registry,
            "studyforge_failed_logins_total",
            "Total number of rejected login attempts",
        )?;

        let quiz_generation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "studyforge_quiz_generation_seconds",
                "Quiz generation latency in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]),
        )
        .map_err(metric_error)?;
        registry
            .register(Box::new(quiz_generation_seconds.clone()))
            .map_err(metric_error)?;

        Ok(Self {
            registry,
            uploads_total,
            uploaded_bytes_total,
            jobs_succeeded_total,
            jobs_failed_total,
            chunks_indexed_total,
            quizzes_generated_total,
            failed_logins_total,
            quiz_generation_seconds,
        })
    }

    pub fn record_upload(&self, files: usize, bytes: u64) {
        self.uploads_total.inc();
        self.uploaded_bytes_total.inc_by(bytes as f64);
        debug!("Recorded upload of {} files ({} bytes)", files, bytes);
    }

    pub fn record_job_succeeded(&self, chunks_indexed: usize) {
        self.jobs_succeeded_total.inc();
        self.chunks_indexed_total.inc_by(chunks_indexed as f64);
    }

    pub fn record_job_failed(&self) {
        self.jobs_failed_total.inc();
    }

    pub fn record_quiz(&self, seconds: f64) {
        self.quizzes_generated_total.inc();
        self.quiz_generation_seconds.observe(seconds);
        debug!("Recorded quiz generation in {:.3}s", seconds);
    }

    pub fn record_failed_login(&self) {
        self.failed_logins_total.inc();
    }

    pub fn get_prometheus_metrics(&self) -> Result<String, StudyError> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metric_error)?;

        String::from_utf8(buffer).map_err(|e| StudyError::InternalError {
            reason: e.to_string(),
        })
    }
}
