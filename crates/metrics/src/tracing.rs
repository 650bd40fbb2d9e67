use study_models::{JobStatus, LoggingConfig, StudyError};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

pub struct TracingService;

impl TracingService {
    /// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
    pub fn init(config: &LoggingConfig) -> Result<(), StudyError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .map_err(|e| StudyError::ConfigError {
                reason: format!("invalid log filter: {}", e),
            })?;

        let result = if config.json {
            tracing_subscriber::fmt()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_timer(UtcTime::rfc_3339())
                .with_env_filter(filter)
                .try_init()
        };

        result.map_err(|e| StudyError::InternalError {
            reason: format!("failed to install tracing subscriber: {}", e),
        })
    }

    pub fn log_upload_accepted(job_id: &str, user_id: i64, files: usize, bytes: u64) {
        info!(
            job_id = %job_id,
            user_id = user_id,
            files = files,
            bytes = bytes,
            "Upload accepted"
        );
    }

    pub fn log_job_finished(job_id: &str, status: JobStatus, chunks_indexed: usize, error: Option<&str>) {
        match status {
            JobStatus::Failed => {
                error!(
                    job_id = %job_id,
                    error_message = %error.unwrap_or("unknown"),
                    "Job failed"
                );
            }
            _ => {
                info!(
                    job_id = %job_id,
                    status = ?status,
                    chunks_indexed = chunks_indexed,
                    "Job finished"
                );
            }
        }
    }

    pub fn log_quiz_generated(job_id: &str, questions: usize, elapsed_ms: u128) {
        info!(
            job_id = %job_id,
            questions = questions,
            elapsed_ms = elapsed_ms as u64,
            "Quiz generated"
        );
    }
}
