use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use study_models::{
    NewUpload, StudyError, UploadRecord, UploadWithUser, User, UserCreate, UserRole, UserUpdate,
    UserUpdateDetails,
};
use tracing::{info, instrument};

/// SQLite access for accounts and uploads.
#[derive(Debug, Clone)]
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, StudyError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StudyError::SqlxError)?;
        row.as_ref().map(row_to_user).transpose()
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StudyError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(StudyError::SqlxError)?;
        row.as_ref().map(row_to_user).transpose()
    }

    #[instrument(skip(self))]
    pub async fn get_all_users(&self) -> Result<Vec<User>, StudyError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(StudyError::SqlxError)?;
        rows.iter().map(row_to_user).collect()
    }

    /// Insert a new account with role `user`. The password must already be
    /// hashed.
    #[instrument(skip(self, request, hashed_password), fields(email = %request.email))]
    pub async fn create_user(
        &self,
        request: &UserCreate,
        hashed_password: &str,
    ) -> Result<User, StudyError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (first_name, last_name, email, hashed_password, role, is_active, is_verified, created_at)
            VALUES (?, ?, ?, ?, ?, 1, 0, ?)
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(hashed_password)
        .bind(UserRole::User.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StudyError::EmailAlreadyRegistered
            }
            other => StudyError::SqlxError(other),
        })?;

        let user_id = result.last_insert_rowid();
        info!("Created user {} ({})", user_id, request.email);
        self.get_user(user_id)
            .await?
            .ok_or(StudyError::UserNotFound { user_id })
    }

    /// Update names and role. Roles other than `admin`, `tutor` and `user`
    /// fall back to `user`. `None` when the user does not exist.
    #[instrument(skip(self, update))]
    pub async fn update_user(
        &self,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<Option<User>, StudyError> {
        let role = UserRole::from_str_or_user(&update.role);
        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, role = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(StudyError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        info!("Updated user {} with role {}", user_id, role);
        self.get_user(user_id).await
    }

    #[instrument(skip(self, details))]
    pub async fn update_user_details(
        &self,
        user_id: i64,
        details: &UserUpdateDetails,
    ) -> Result<Option<User>, StudyError> {
        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&details.first_name)
        .bind(&details.last_name)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(StudyError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(user_id).await
    }

    /// Remove an account together with its uploads.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: i64) -> Result<bool, StudyError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(StudyError::SqlxError)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, upload), fields(upload_id = %upload.upload_id))]
    pub async fn create_upload_file(&self, upload: &NewUpload) -> Result<UploadRecord, StudyError> {
        let filenames = serde_json::to_string(&upload.filenames).map_err(|e| {
            StudyError::InternalError {
                reason: e.to_string(),
            }
        })?;

        sqlx::query(
            r#"
            INSERT INTO uploads (course_code, week, user_id, upload_id, filenames, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&upload.course_code)
        .bind(&upload.week)
        .bind(upload.user_id)
        .bind(&upload.upload_id)
        .bind(filenames)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(StudyError::SqlxError)?;

        self.get_files_by_job_id(&upload.upload_id)
            .await?
            .ok_or_else(|| StudyError::UploadNotFound {
                job_id: upload.upload_id.clone(),
            })
    }

    #[instrument(skip(self))]
    pub async fn get_files_by_job_id(&self, job_id: &str) -> Result<Option<UploadRecord>, StudyError> {
        let row = sqlx::query("SELECT * FROM uploads WHERE upload_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StudyError::SqlxError)?;
        row.as_ref().map(row_to_upload).transpose()
    }

    /// Uploads newest first, joined with their owner's name. `None` lists
    /// every user's uploads.
    #[instrument(skip(self))]
    pub async fn get_user_uploads(&self, user_id: Option<i64>) -> Result<Vec<UploadWithUser>, StudyError> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query(
                    r#"
                    SELECT uploads.*, users.first_name, users.last_name
                    FROM uploads JOIN users ON users.id = uploads.user_id
                    WHERE uploads.user_id = ?
                    ORDER BY uploads.id DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT uploads.*, users.first_name, users.last_name
                    FROM uploads JOIN users ON users.id = uploads.user_id
                    ORDER BY uploads.id DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(StudyError::SqlxError)?;

        rows.iter()
            .map(|row| {
                Ok(UploadWithUser {
                    upload: row_to_upload(row)?,
                    first_name: row.try_get("first_name").map_err(StudyError::SqlxError)?,
                    last_name: row.try_get("last_name").map_err(StudyError::SqlxError)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn delete_uploaded_files(&self, job_id: &str) -> Result<bool, StudyError> {
        let result = sqlx::query("DELETE FROM uploads WHERE upload_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(StudyError::SqlxError)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_random_upload_id(&self) -> Result<Option<String>, StudyError> {
        let row = sqlx::query("SELECT upload_id FROM uploads ORDER BY RANDOM() LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(StudyError::SqlxError)?;
        row.map(|r| r.try_get("upload_id").map_err(StudyError::SqlxError))
            .transpose()
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, StudyError> {
    let role: String = row.try_get("role").map_err(StudyError::SqlxError)?;
    Ok(User {
        id: row.try_get("id").map_err(StudyError::SqlxError)?,
        first_name: row.try_get("first_name").map_err(StudyError::SqlxError)?,
        last_name: row.try_get("last_name").map_err(StudyError::SqlxError)?,
        email: row.try_get("email").map_err(StudyError::SqlxError)?,
        hashed_password: row
            .try_get("hashed_password")
            .map_err(StudyError::SqlxError)?,
        role: UserRole::from_str_or_user(&role),
        is_active: row.try_get("is_active").map_err(StudyError::SqlxError)?,
        is_verified: row.try_get("is_verified").map_err(StudyError::SqlxError)?,
        created_at: row.try_get("created_at").map_err(StudyError::SqlxError)?,
        updated_at: row.try_get("updated_at").map_err(StudyError::SqlxError)?,
    })
}

fn row_to_upload(row: &SqliteRow) -> Result<UploadRecord, StudyError> {
    let filenames: Vec<String> = serde_json::from_str(
        row.try_get::<String, _>("filenames")
            .map_err(StudyError::SqlxError)?
            .as_str(),
    )
    .unwrap_or_default();

    Ok(UploadRecord {
        id: row.try_get("id").map_err(StudyError::SqlxError)?,
        course_code: row.try_get("course_code").map_err(StudyError::SqlxError)?,
        week: row.try_get("week").map_err(StudyError::SqlxError)?,
        user_id: row.try_get("user_id").map_err(StudyError::SqlxError)?,
        upload_id: row.try_get("upload_id").map_err(StudyError::SqlxError)?,
        filenames,
        created_at: row.try_get("created_at").map_err(StudyError::SqlxError)?,
        updated_at: row.try_get("updated_at").map_err(StudyError::SqlxError)?,
    })
}
