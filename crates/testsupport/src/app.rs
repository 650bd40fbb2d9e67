use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use study_control::ControlPlane;
use study_index::{HashingEmbedder, IndexStore};
use study_metrics::MetricsService;
use study_models::{Config, Job, StudyError, User, UserCreate, UserUpdate};
pub use study_quiz::ChatModel;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::poll_until;

pub const TEST_PASSWORD: &str = "secret-password";

/// Defaults pointed at `work_dir` with fast password hashing.
pub fn test_config(work_dir: &Path) -> Config {
    let mut config = Config::default();
    config.data.work_dir = work_dir.to_string_lossy().into_owned();
    config.data.db_url = "sqlite::memory:".to_string();
    config.auth.secret_key = "test-secret".to_string();
    config.auth.password_iterations = 1_000;
    config.openai.api_key = None;
    config
}

/// Chat model answering every prompt with the same JSON document.
pub struct StubChat {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl StubChat {
    pub fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// A one-question true/false quiz citing `source`.
    pub fn true_false(source: &str) -> Arc<Self> {
        Self::new(
            serde_json::json!({
                "title": "Stub quiz",
                "questions": [{
                    "type": "true_false",
                    "question": "Borrowing moves ownership.",
                    "correctAnswers": ["False"],
                    "explanation": "Borrowing lends access.",
                    "citations": [{"source": source, "chunk": 0}]
                }]
            })
            .to_string(),
        )
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for StubChat {
    async fn complete_json(
        &self,
        _system: &str,
        user: &str,
        _temperature: f32,
    ) -> Result<String, StudyError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(user.to_string());
        }
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

/// A control plane over in-memory databases and a temporary work dir.
pub struct TestEnv {
    pub work_dir: TempDir,
    pub control: Arc<ControlPlane>,
}

impl TestEnv {
    pub async fn new(chat: Option<Arc<dyn ChatModel>>) -> Result<Self> {
        Self::with_config(chat, |_| {}).await
    }

    /// Like [`TestEnv::new`] with `adjust` applied to the test config.
    pub async fn with_config(
        chat: Option<Arc<dyn ChatModel>>,
        adjust: impl FnOnce(&mut Config),
    ) -> Result<Self> {
        let work_dir = tempfile::tempdir()?;
        let mut config = test_config(work_dir.path());
        adjust(&mut config);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let index = IndexStore::connect("sqlite::memory:").await?;
        let control = ControlPlane::new(
            pool,
            index,
            Arc::new(HashingEmbedder::default()),
            chat,
            Arc::new(MetricsService::new()?),
            config,
        )
        .await?;
        Ok(Self {
            work_dir,
            control: Arc::new(control),
        })
    }

    /// Registers a user with [`TEST_PASSWORD`] and the given role.
    pub async fn user_with_role(&self, email: &str, role: &str) -> Result<User> {
        let user = self
            .control
            .create_user(&UserCreate {
                first_name: "Test".into(),
                last_name: role.to_string(),
                email: email.to_string(),
                password: TEST_PASSWORD.into(),
            })
            .await?;
        let updated = self
            .control
            .registry()
            .update_user(
                user.id,
                &UserUpdate {
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    role: role.to_string(),
                },
            )
            .await?;
        updated.ok_or_else(|| anyhow::anyhow!("user {} vanished", user.id))
    }

    /// Waits up to five seconds for the job to reach a terminal state.
    pub async fn wait_for_job(&self, job_id: &str) -> Result<Job> {
        let control = &self.control;
        poll_until(&format!("job {}", job_id), Duration::from_secs(5), move || async move {
            Ok(control
                .get_job(job_id)
                .map(|job| job.status.is_terminal())
                .unwrap_or(false))
        })
        .await?;
        Ok(self.control.get_job(job_id)?)
    }

    pub async fn token_for(&self, email: &str, role: &str) -> Result<String> {
        let user = self.user_with_role(email, role).await?;
        Ok(self.control.issue_token(&user)?)
    }
}

/// An axum app served on an ephemeral local port.
#[derive(Debug)]
pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn serve(app: axum::Router) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self {
            base_url: format!("http://{}", addr),
            handle,
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
