use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use study_models::{OpenAiConfig, StudyError};
use tracing::{debug, info, instrument};

/// Turns chunk texts and queries into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StudyError>;

    /// Identifier recorded in logs.
    fn name(&self) -> &str;
}

/// Pick the remote embedder when an API key is configured, the local one otherwise.
pub fn embedder_from_config(config: &OpenAiConfig) -> Result<Arc<dyn Embedder>, StudyError> {
    match config.api_key.as_deref() {
        Some(key) if !key.is_empty() => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        _ => {
            info!("No OpenAI API key configured, using local hashing embedder");
            Ok(Arc::new(HashingEmbedder::default()))
        }
    }
}

const EMBED_BATCH: usize = 64;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &OpenAiConfig) -> Result<Self, StudyError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(StudyError::ProviderNotConfigured)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StudyError::ProviderError {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.embed_model.clone(),
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, StudyError> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|e| StudyError::ProviderError {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StudyError::ProviderError {
                reason: format!("embeddings request failed with {}: {}", status, body),
            });
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| StudyError::ProviderError {
                reason: e.to_string(),
            })?;
        if parsed.data.len() != batch.len() {
            return Err(StudyError::ProviderError {
                reason: format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    parsed.data.len()
                ),
            });
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StudyError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        debug!("Embedded {} texts", vectors.len());
        Ok(vectors)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Texts sharing vocabulary land close together under cosine distance, which
/// is enough for offline use and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StudyError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_distance;

    #[test]
    fn hashing_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("Ownership and borrowing");
        assert_eq!(a, embedder.embed_one("ownership AND borrowing"));
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(8).embed_one("  ... ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_one("borrow checker rules");
        let near = embedder.embed_one("the borrow checker enforces rules");
        let far = embedder.embed_one("photosynthesis in green plants");
        assert!(cosine_distance(&query, &near) < cosine_distance(&query, &far));
    }

    #[test]
    fn missing_key_falls_back_to_hashing() {
        let config = study_models::Config::default().openai;
        let embedder = embedder_from_config(&config).unwrap();
        assert_eq!(embedder.name(), "hashing");
        assert!(matches!(
            OpenAiEmbedder::new(&config),
            Err(StudyError::ProviderNotConfigured)
        ));
    }
}
