use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use study_models::StudyError;
use tracing::debug;
use uuid::Uuid;

const MAX_NAME_CHARS: usize = 200;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"))
}

/// Make an uploaded filename safe to use as a single path component.
pub fn safe_name(name: &str) -> String {
    let cleaned = unsafe_chars().replace_all(name, "_");
    let cleaned = if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.into_owned()
    };
    cleaned.chars().take(MAX_NAME_CHARS).collect()
}

/// Folder layout under the work directory: `<root>/<job>/in` holds the raw
/// uploads until processing finishes, `<root>/<job>/out` holds artefacts.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StudyError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let root = std::fs::canonicalize(root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder of one job. Only canonical UUIDs are accepted so an id can
    /// never name anything but a direct child of the work directory.
    pub fn job_dir(&self, job_id: &str) -> Result<PathBuf, StudyError> {
        if !is_job_id(job_id) {
            return Err(StudyError::BadRequest {
                reason: format!("Invalid job id: {}", job_id),
            });
        }
        Ok(self.root.join(job_id))
    }

    pub fn job_in_dir(&self, job_id: &str) -> Result<PathBuf, StudyError> {
        let path = self.job_dir(job_id)?.join("in");
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn job_out_dir(&self, job_id: &str) -> Result<PathBuf, StudyError> {
        let path = self.job_dir(job_id)?.join("out");
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn cleanup_job(&self, job_id: &str) {
        if let Ok(dir) = self.job_dir(job_id) {
            remove_dir_quietly(&dir);
        }
    }

    pub fn cleanup_job_in(&self, job_id: &str) {
        if let Ok(dir) = self.job_dir(job_id) {
            remove_dir_quietly(&dir.join("in"));
        }
    }

    /// Remove the job folder, reporting failures.
    pub fn remove_job(&self, job_id: &str) -> Result<bool, StudyError> {
        let dir = self.job_dir(job_id)?;
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }
}

/// Lowercase hyphenated UUID, the only form `Uuid::new_v4` job ids take.
pub fn is_job_id(job_id: &str) -> bool {
    Uuid::parse_str(job_id)
        .map(|id| id.hyphenated().to_string() == job_id)
        .unwrap_or(false)
}

fn remove_dir_quietly(dir: &Path) {
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            debug!("Ignoring cleanup failure for {}: {}", dir.display(), e);
        }
    }
}
