use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: i64,
    pub course_code: String,
    pub week: String,
    pub user_id: i64,
    /// Same value as the job id of the processing run.
    pub upload_id: String,
    pub filenames: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Upload joined with the uploader's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadWithUser {
    pub upload: UploadRecord,
    pub first_name: String,
    pub last_name: String,
}

impl UploadWithUser {
    pub fn user_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct NewUpload {
    pub user_id: i64,
    pub upload_id: String,
    pub filenames: Vec<String>,
    pub course_code: String,
    pub week: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadAccepted {
    pub id: i64,
    pub job_id: String,
    pub filenames: Vec<String>,
    pub week: String,
    pub course_code: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadFilesResponse {
    pub job_id: String,
    pub filenames: Vec<String>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserUploadItem {
    pub id: i64,
    pub course_code: String,
    pub week: String,
    pub job_id: String,
    pub filenames: Vec<String>,
    pub user_name: String,
}

impl From<&UploadWithUser> for UserUploadItem {
    fn from(item: &UploadWithUser) -> Self {
        Self {
            id: item.upload.id,
            course_code: item.upload.course_code.clone(),
            week: item.upload.week.clone(),
            job_id: item.upload.upload_id.clone(),
            filenames: item.upload.filenames.clone(),
            user_name: item.user_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RandomUploadResponse {
    pub job_id: Option<String>,
}
