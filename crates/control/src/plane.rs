use crate::auth::{PasswordHasher, TokenService};
use crate::jobs::JobRegistry;
use crate::migrations;
use crate::registry::Registry;
use crate::tasks::JobProcessor;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use study_index::{embedder_from_config, Embedder, IndexStore, RagIndex};
use study_ingest::{Extractor, UploadStore};
use study_metrics::{MetricsService, TracingService};
use study_models::{
    is_valid_email, ChunkMeta, Config, DocsetsResponse, EvaluateAnswerRequest, Evaluation, Job,
    JobStatus, NewUpload, Quiz, QuizRequest, RandomUploadResponse, StudyError, TokenWithUser,
    UploadAccepted, UploadFilesResponse, User, UserCreate, UserOut, UserRole, UserUpdate,
    UserUploadItem,
};
use study_quiz::{evaluate_short_answer, ChatModel, OpenAiChat, QuizGenerator};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct ControlPlane {
    registry: Registry,
    jobs: JobRegistry,
    uploads: UploadStore,
    index: IndexStore,
    embedder: Arc<dyn Embedder>,
    quiz: Option<QuizGenerator>,
    passwords: PasswordHasher,
    tokens: TokenService,
    processor: JobProcessor,
    metrics: Arc<MetricsService>,
    config: Config,
}

impl ControlPlane {
    /// Build the control plane from explicit parts. Runs the registry
    /// migrations and creates the work directory.
    pub async fn new(
        pool: SqlitePool,
        index: IndexStore,
        embedder: Arc<dyn Embedder>,
        chat: Option<Arc<dyn ChatModel>>,
        metrics: Arc<MetricsService>,
        config: Config,
    ) -> Result<Self, StudyError> {
        migrations::run_migrations(&pool)
            .await
            .map_err(|e| StudyError::DatabaseError {
                reason: e.to_string(),
            })?;

        let uploads = UploadStore::new(&config.data.work_dir)?;
        let jobs = JobRegistry::new();
        let processor = JobProcessor::new(
            jobs.clone(),
            uploads.clone(),
            index.clone(),
            embedder.clone(),
            Extractor::new(&config.extraction),
            config.chunking.clone(),
            metrics.clone(),
        );
        let quiz = chat.map(|model| {
            QuizGenerator::new(model, config.quiz.char_budget, config.openai.temperature)
        });

        Ok(Self {
            registry: Registry::new(pool),
            jobs,
            uploads,
            index,
            embedder,
            quiz,
            passwords: PasswordHasher::new(config.auth.password_iterations),
            tokens: TokenService::new(&config.auth)?,
            processor,
            metrics,
            config,
        })
    }

    /// Wire the configured providers: the retrieval index under the work
    /// directory, OpenAI embeddings (or local hashing without a key) and the
    /// chat model when a key is present.
    pub async fn from_config(
        pool: SqlitePool,
        metrics: Arc<MetricsService>,
        config: Config,
    ) -> Result<Self, StudyError> {
        let index = IndexStore::open(Path::new(&config.data.work_dir)).await?;
        let embedder = embedder_from_config(&config.openai)?;
        let chat: Option<Arc<dyn ChatModel>> = match OpenAiChat::new(&config.openai) {
            Ok(chat) => Some(Arc::new(chat)),
            Err(StudyError::ProviderNotConfigured) => {
                warn!("No OpenAI API key configured, quiz generation is disabled");
                None
            }
            Err(e) => return Err(e),
        };
        info!("Using {} embeddings", embedder.name());
        Self::new(pool, index, embedder, chat, metrics, config).await
    }

    // Accessors for subsystems
    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }
    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }
    pub fn metrics(&self) -> Arc<MetricsService> {
        self.metrics.clone()
    }
    pub fn processor(&self) -> &JobProcessor {
        &self.processor
    }

    async fn open_index(&self, job_id: &str) -> Result<RagIndex, StudyError> {
        RagIndex::open(
            self.index.clone(),
            self.embedder.clone(),
            job_id,
            self.config.chunking.clone(),
        )
        .await
    }

    // Accounts

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(&self, request: &UserCreate) -> Result<User, StudyError> {
        if !is_valid_email(&request.email) {
            return Err(StudyError::InvalidRequest {
                reason: "value is not a valid email address".to_string(),
            });
        }
        if self.registry.get_user_by_email(&request.email).await?.is_some() {
            return Err(StudyError::EmailAlreadyRegistered);
        }
        let hashed = self.passwords.hash(&request.password)?;
        self.registry.create_user(request, &hashed).await
    }

    /// `None` when the email is unknown or the password does not match.
    pub async fn authenticate_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StudyError> {
        let Some(user) = self.registry.get_user_by_email(email).await? else {
            return Ok(None);
        };
        if !self.passwords.verify(password, &user.hashed_password) {
            return Ok(None);
        }
        Ok(Some(user))
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenWithUser, StudyError> {
        let Some(user) = self.authenticate_user(username, password).await? else {
            self.metrics.record_failed_login();
            warn!("Rejected login for {}", username);
            return Err(StudyError::IncorrectLogin);
        };
        let access_token = self.tokens.create_access_token(&user.email)?;
        info!("User {} logged in", user.id);
        Ok(TokenWithUser {
            access_token,
            token_type: "bearer".to_string(),
            user: UserOut::from(&user),
        })
    }

    /// Resolve a bearer token to an active user.
    pub async fn current_user(&self, token: &str) -> Result<User, StudyError> {
        let claims = self.tokens.decode(token)?;
        if claims.sub.is_empty() {
            return Err(StudyError::InvalidCredentials);
        }
        let user = self
            .registry
            .get_user_by_email(&claims.sub)
            .await?
            .ok_or(StudyError::InvalidCredentials)?;
        if !user.is_active {
            return Err(StudyError::InactiveUser);
        }
        Ok(user)
    }

    pub fn issue_token(&self, user: &User) -> Result<String, StudyError> {
        self.tokens.create_access_token(&user.email)
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<UserOut>, StudyError> {
        if !actor.is_admin() {
            return Err(StudyError::forbidden("You do not have admin permissions"));
        }
        let users = self.registry.get_all_users().await?;
        Ok(users.iter().map(UserOut::from).collect())
    }

    #[instrument(skip(self, actor, update), fields(actor = actor.id))]
    pub async fn update_user(
        &self,
        actor: &User,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<UserOut, StudyError> {
        if !actor.is_admin() {
            return Err(StudyError::forbidden("Admin privileges required"));
        }
        let user = self
            .registry
            .update_user(user_id, update)
            .await?
            .ok_or(StudyError::UserNotFound { user_id })?;
        Ok(UserOut::from(&user))
    }

    // Uploads and jobs

    /// Reserve a job id and its input folder for an incoming upload.
    pub fn begin_upload(&self) -> Result<(String, PathBuf), StudyError> {
        let job_id = Uuid::new_v4().to_string();
        let in_dir = self.uploads.job_in_dir(&job_id)?;
        Ok((job_id, in_dir))
    }

    /// Drop the folder of a rejected upload. It has no record and no job yet.
    pub fn abort_upload(&self, job_id: &str) {
        self.uploads.cleanup_job(job_id);
    }

    /// Record a fully written upload and start processing it.
    #[instrument(skip(self, user, filenames), fields(user_id = user.id, files = filenames.len()))]
    pub async fn accept_upload(
        &self,
        user: &User,
        job_id: &str,
        course_code: &str,
        week: &str,
        filenames: Vec<String>,
        bytes: u64,
    ) -> Result<UploadAccepted, StudyError> {
        let new_upload = NewUpload {
            user_id: user.id,
            upload_id: job_id.to_string(),
            filenames,
            course_code: course_code.to_string(),
            week: week.to_string(),
        };
        let record = match self.registry.create_upload_file(&new_upload).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to save upload {}: {}", job_id, e);
                self.abort_upload(job_id);
                return Err(StudyError::OperationFailed {
                    reason: "Failed to save upload information".to_string(),
                });
            }
        };

        self.jobs.create_job(job_id);
        let processor = self.processor.clone();
        let spawned_id = job_id.to_string();
        tokio::spawn(async move {
            processor.process_job(&spawned_id).await;
        });

        self.metrics.record_upload(record.filenames.len(), bytes);
        TracingService::log_upload_accepted(job_id, user.id, record.filenames.len(), bytes);
        Ok(UploadAccepted {
            id: record.id,
            job_id: job_id.to_string(),
            filenames: record.filenames,
            week: record.week,
            course_code: record.course_code,
            user_name: user.full_name(),
        })
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job, StudyError> {
        self.jobs.get_job(job_id).ok_or_else(|| StudyError::JobNotFound {
            job_id: job_id.to_string(),
        })
    }

    /// Path of a finished job's artefact.
    pub fn job_result(&self, job_id: &str) -> Result<PathBuf, StudyError> {
        let path = self
            .jobs
            .get_job(job_id)
            .filter(|job| job.status == JobStatus::Succeeded)
            .and_then(|job| job.result_path)
            .ok_or_else(|| StudyError::NotFound {
                reason: "Result not available".to_string(),
            })?;
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(StudyError::Gone {
                reason: "Result expired".to_string(),
            });
        }
        Ok(path)
    }

    pub async fn get_files(&self, job_id: &str) -> Result<UploadFilesResponse, StudyError> {
        let record = self
            .registry
            .get_files_by_job_id(job_id)
            .await?
            .ok_or_else(|| StudyError::UploadNotFound {
                job_id: job_id.to_string(),
            })?;
        Ok(UploadFilesResponse {
            job_id: record.upload_id,
            filenames: record.filenames,
            user_id: record.user_id,
        })
    }

    /// Admins see every upload, tutors their own.
    pub async fn user_uploads(&self, actor: &User) -> Result<Vec<UserUploadItem>, StudyError> {
        let owner = match actor.role {
            UserRole::Admin => None,
            UserRole::Tutor => Some(actor.id),
            UserRole::User => {
                return Err(StudyError::forbidden(
                    "You do not have appropriate permissions to upload files",
                ))
            }
        };
        let uploads = self.registry.get_user_uploads(owner).await?;
        Ok(uploads.iter().map(UserUploadItem::from).collect())
    }

    /// Remove an upload's folder, index collection and record.
    #[instrument(skip(self, actor), fields(actor = actor.id))]
    pub async fn delete_upload(&self, actor: &User, job_id: &str) -> Result<(), StudyError> {
        if !actor.is_admin() {
            return Err(StudyError::forbidden("Admin privileges required"));
        }
        self.uploads.job_dir(job_id)?;

        if let Err(e) = self.uploads.remove_job(job_id) {
            warn!("Failed to remove job folder for {}: {}", job_id, e);
        }

        match self.open_index(job_id).await {
            Ok(index) => match index.delete_collection().await {
                Ok(removed) => info!("Index cleanup for {}: {}", job_id, removed),
                Err(e) => warn!("Index deletion failed for {}: {}", job_id, e),
            },
            Err(e) => warn!("Index deletion failed for {}: {}", job_id, e),
        }

        self.registry
            .delete_uploaded_files(job_id)
            .await
            .map_err(|e| StudyError::OperationFailed {
                reason: format!("DB cleanup failed: {}", e),
            })?;
        info!("Deleted upload {}", job_id);
        Ok(())
    }

    pub async fn random_upload_id(&self) -> Result<RandomUploadResponse, StudyError> {
        Ok(RandomUploadResponse {
            job_id: self.registry.get_random_upload_id().await?,
        })
    }

    // Retrieval and quizzes

    async fn docset(&self, job_id: &str) -> Result<(Vec<String>, Vec<ChunkMeta>), StudyError> {
        self.open_index(job_id)
            .await?
            .get_all_for_docset(job_id, None)
            .await
    }

    pub async fn get_docsets(&self, job_id: &str) -> Result<DocsetsResponse, StudyError> {
        let (docsets, metas) = self.docset(job_id).await?;
        if docsets.is_empty() {
            return Err(StudyError::NotFound {
                reason: "Docsets not found".to_string(),
            });
        }
        Ok(DocsetsResponse { docsets, metas })
    }

    #[instrument(skip(self, request), fields(job_id = %request.job_id))]
    pub async fn generate_quiz(&self, request: &QuizRequest) -> Result<Quiz, StudyError> {
        let (docs, metas) = self.docset(&request.job_id).await?;
        if docs.is_empty() {
            return Err(StudyError::NotFound {
                reason: "No indexed documents for this jobId".to_string(),
            });
        }
        let generator = self.quiz.as_ref().ok_or(StudyError::ProviderNotConfigured)?;

        let started = Instant::now();
        let quiz = generator
            .generate_quiz_from_chunks(
                &docs,
                &metas,
                request.num_questions,
                &request.types,
                request.topic_hint.as_deref(),
            )
            .await?;
        let elapsed = started.elapsed();

        self.metrics.record_quiz(elapsed.as_secs_f64());
        TracingService::log_quiz_generated(&request.job_id, quiz.questions.len(), elapsed.as_millis());
        Ok(quiz)
    }

    pub fn evaluate_answer(&self, request: &EvaluateAnswerRequest) -> Result<Evaluation, StudyError> {
        evaluate_short_answer(&request.user_answer, &request.question)
    }
}
