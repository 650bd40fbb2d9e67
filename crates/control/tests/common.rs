#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use study_control::ControlPlane;
use study_index::{HashingEmbedder, IndexStore};
use study_metrics::MetricsService;
use study_models::{Config, Job, StudyError, User, UserCreate, UserUpdate};
use study_quiz::ChatModel;

pub fn test_config(work_dir: &Path) -> Config {
    let mut config = Config::default();
    config.data.work_dir = work_dir.to_string_lossy().into_owned();
    config.auth.secret_key = "test-secret".to_string();
    config.auth.password_iterations = 1_000;
    config
}

pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

/// Chat model that answers every prompt with the same text.
pub struct CannedChat {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl CannedChat {
    pub fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for CannedChat {
    async fn complete_json(&self, _system: &str, user: &str, _temperature: f32) -> Result<String, StudyError> {
        self.prompts.lock().unwrap().push(user.to_string());
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

pub async fn control_plane(work_dir: &Path, chat: Option<Arc<dyn ChatModel>>) -> ControlPlane {
    let pool = memory_pool().await;
    let index = IndexStore::connect("sqlite::memory:").await.unwrap();
    ControlPlane::new(
        pool,
        index,
        Arc::new(HashingEmbedder::default()),
        chat,
        Arc::new(MetricsService::new().unwrap()),
        test_config(work_dir),
    )
    .await
    .unwrap()
}

pub async fn user_with_role(control: &ControlPlane, email: &str, role: &str) -> User {
    let user = control
        .create_user(&UserCreate {
            first_name: "Test".into(),
            last_name: role.to_string(),
            email: email.to_string(),
            password: "secret-password".into(),
        })
        .await
        .unwrap();
    control
        .registry()
        .update_user(
            user.id,
            &UserUpdate {
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                role: role.to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap()
}

pub async fn wait_for_terminal(control: &ControlPlane, job_id: &str) -> Job {
    for _ in 0..200 {
        if let Some(job) = control.jobs().get_job(job_id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not finish", job_id);
}
