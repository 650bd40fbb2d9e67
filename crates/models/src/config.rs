use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::StudyError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub uploads: UploadConfig,
    pub auth: AuthConfig,
    pub openai: OpenAiConfig,
    pub chunking: ChunkingConfig,
    pub quiz: QuizConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_request_body_size_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Root for job folders and the retrieval index.
    pub work_dir: String,
    pub db_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    pub max_upload_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub secret_key: String,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub password_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// Without a key the service falls back to local hashing embeddings
    /// and quiz generation is rejected.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub embed_model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap: usize,
    pub min_break: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QuizConfig {
    pub char_budget: usize,
    pub default_num_questions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    pub ocr: bool,
    pub max_text_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 8000,
                max_request_body_size_mb: 256,
            },
            data: DataConfig {
                work_dir: "/app/uploaded_files".to_string(),
                db_url: "sqlite://data/studyforge.db".to_string(),
            },
            uploads: UploadConfig { max_upload_mb: 200 },
            auth: AuthConfig {
                secret_key: "change-me".to_string(),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 60,
                password_iterations: 60_000,
            },
            openai: OpenAiConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                embed_model: "text-embedding-3-small".to_string(),
                temperature: 0.9,
                request_timeout_secs: 120,
            },
            chunking: ChunkingConfig {
                max_chars: 1200,
                overlap: 200,
                min_break: 200,
            },
            quiz: QuizConfig {
                char_budget: 12_000,
                default_num_questions: 12,
            },
            extraction: ExtractionConfig {
                ocr: false,
                max_text_bytes: 10 * 1024 * 1024,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

/// Flat environment variables understood for compatibility with existing
/// deployments, mapped onto their nested config keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("WORK_DIR", "data.work_dir"),
    ("DB_URL", "data.db_url"),
    ("PORT", "server.port"),
    ("MAX_UPLOAD_MB", "uploads.max_upload_mb"),
    ("SECRET_KEY", "auth.secret_key"),
    ("ALGORITHM", "auth.algorithm"),
    ("ACCESS_TOKEN_EXPIRE_MINUTES", "auth.access_token_expire_minutes"),
    ("OPENAI_API_KEY", "openai.api_key"),
    ("OPENAI_BASE_URL", "openai.base_url"),
    ("OPENAI_MODEL", "openai.model"),
    ("OPENAI_EMBED_MODEL", "openai.embed_model"),
];

impl Config {
    /// Defaults, then the TOML file (if present), then `STUDYFORGE_*`
    /// variables, then the legacy flat variables.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("STUDYFORGE_").split("__"));
        for (var, key) in LEGACY_ENV {
            let key = *key;
            figment = figment.merge(Env::raw().only(&[*var]).map(move |_| key.into()));
        }
        figment
    }

    pub fn load(path: Option<&Path>) -> Result<Self, StudyError> {
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, StudyError> {
        let config: Config = figment.extract().map_err(|e| StudyError::ConfigError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StudyError> {
        if self.chunking.max_chars == 0 {
            return Err(StudyError::ConfigError {
                reason: "chunking.max_chars must be positive".to_string(),
            });
        }
        if self.chunking.overlap >= self.chunking.max_chars {
            return Err(StudyError::ConfigError {
                reason: "chunking.overlap must be smaller than chunking.max_chars".to_string(),
            });
        }
        if !matches!(self.auth.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(StudyError::ConfigError {
                reason: format!("unsupported token algorithm: {}", self.auth.algorithm),
            });
        }
        if self.auth.access_token_expire_minutes <= 0 {
            return Err(StudyError::ConfigError {
                reason: "auth.access_token_expire_minutes must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.uploads.max_upload_mb * 1024 * 1024
    }
}
