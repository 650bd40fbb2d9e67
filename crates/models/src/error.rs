use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Error body returned by every endpoint: `{"detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ErrorShape {
    pub detail: String,
}

impl ErrorShape {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Could not validate credentials")]
    InvalidCredentials,

    #[error("Could not validate token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Incorrect email or password")]
    IncorrectLogin,

    #[error("Inactive user")]
    InactiveUser,

    #[error("{reason}")]
    Forbidden { reason: String },

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("User not found")]
    UserNotFound { user_id: i64 },

    #[error("Job not found")]
    JobNotFound { job_id: String },

    #[error("Files not found")]
    UploadNotFound { job_id: String },

    #[error("{reason}")]
    NotFound { reason: String },

    #[error("{reason}")]
    Gone { reason: String },

    #[error("{reason}")]
    BadRequest { reason: String },

    #[error("Total upload too large")]
    UploadTooLarge { size: u64, max_size: u64 },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Storage error: {reason}")]
    StorageError { reason: String },

    #[error("Extraction error: {reason}")]
    ExtractionError { reason: String },

    #[error("Index error: {reason}")]
    IndexError { reason: String },

    #[error("Model provider error: {reason}")]
    ProviderError { reason: String },

    #[error("Model provider not configured")]
    ProviderNotConfigured,

    #[error("Internal server error: {reason}")]
    InternalError { reason: String },

    /// A server-side failure whose message is returned verbatim.
    #[error("{reason}")]
    OperationFailed { reason: String },

    #[error("Database error: {reason}")]
    DatabaseError { reason: String },

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },
}

impl StudyError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        StudyError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn to_error_shape(&self) -> ErrorShape {
        ErrorShape::new(self.to_string())
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            StudyError::NotAuthenticated
            | StudyError::InvalidCredentials
            | StudyError::InvalidToken
            | StudyError::TokenExpired => "Unauthorized",
            StudyError::IncorrectLogin
            | StudyError::InactiveUser
            | StudyError::EmailAlreadyRegistered
            | StudyError::BadRequest { .. } => "BadRequest",
            StudyError::Forbidden { .. } => "Forbidden",
            StudyError::UserNotFound { .. }
            | StudyError::JobNotFound { .. }
            | StudyError::UploadNotFound { .. }
            | StudyError::NotFound { .. } => "NotFound",
            StudyError::Gone { .. } => "Gone",
            StudyError::UploadTooLarge { .. } => "PayloadTooLarge",
            StudyError::InvalidRequest { .. } => "ValidationError",
            StudyError::ProviderError { .. } | StudyError::ProviderNotConfigured => {
                "ProviderError"
            }
            StudyError::StorageError { .. }
            | StudyError::ExtractionError { .. }
            | StudyError::IndexError { .. }
            | StudyError::InternalError { .. }
            | StudyError::OperationFailed { .. }
            | StudyError::DatabaseError { .. }
            | StudyError::SqlxError(_)
            | StudyError::ConfigError { .. } => "ServiceException",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            StudyError::NotAuthenticated
            | StudyError::InvalidCredentials
            | StudyError::InvalidToken
            | StudyError::TokenExpired => 401,
            StudyError::IncorrectLogin
            | StudyError::InactiveUser
            | StudyError::EmailAlreadyRegistered
            | StudyError::BadRequest { .. } => 400,
            StudyError::Forbidden { .. } => 403,
            StudyError::UserNotFound { .. }
            | StudyError::JobNotFound { .. }
            | StudyError::UploadNotFound { .. }
            | StudyError::NotFound { .. } => 404,
            StudyError::Gone { .. } => 410,
            StudyError::UploadTooLarge { .. } => 413,
            StudyError::InvalidRequest { .. } => 422,
            StudyError::ProviderError { .. } => 502,
            StudyError::ProviderNotConfigured => 503,
            StudyError::StorageError { .. }
            | StudyError::ExtractionError { .. }
            | StudyError::IndexError { .. }
            | StudyError::InternalError { .. }
            | StudyError::OperationFailed { .. }
            | StudyError::DatabaseError { .. }
            | StudyError::SqlxError(_)
            | StudyError::ConfigError { .. } => 500,
        }
    }

    /// Unauthorized responses carry a bearer challenge.
    pub fn wants_bearer_challenge(&self) -> bool {
        matches!(
            self,
            StudyError::NotAuthenticated | StudyError::InvalidCredentials
        )
    }
}

impl From<std::io::Error> for StudyError {
    fn from(e: std::io::Error) -> Self {
        StudyError::StorageError {
            reason: e.to_string(),
        }
    }
}
