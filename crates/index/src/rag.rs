use crate::embedder::Embedder;
use crate::similarity::cosine_distance;
use crate::store::{ChunkRecord, IndexStore};
use std::sync::Arc;
use study_ingest::{chunk_text, stable_id};
use study_models::{ChunkMeta, ChunkingConfig, QueryHit, StudyError};
use tracing::{debug, info, instrument};

pub const DEFAULT_TOP_K: usize = 5;

/// Retrieval index for one collection (one upload job).
pub struct RagIndex {
    store: IndexStore,
    embedder: Arc<dyn Embedder>,
    collection: String,
    chunking: ChunkingConfig,
}

impl RagIndex {
    /// Get or create the named collection.
    pub async fn open(
        store: IndexStore,
        embedder: Arc<dyn Embedder>,
        collection: &str,
        chunking: ChunkingConfig,
    ) -> Result<Self, StudyError> {
        if collection.trim().is_empty() {
            return Err(StudyError::InvalidRequest {
                reason: "Collection name (e.g., job_id) is required".to_string(),
            });
        }
        store.ensure_collection(collection).await?;
        Ok(Self {
            store,
            embedder,
            collection: collection.to_string(),
            chunking,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Chunk, embed and upsert one document. Returns the number of chunks.
    #[instrument(skip(self, text), fields(collection = %self.collection))]
    pub async fn add_document(
        &self,
        docset_id: &str,
        source: &str,
        text: &str,
    ) -> Result<usize, StudyError> {
        let chunks = chunk_text(text, &self.chunking);
        if chunks.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed(&chunks).await?;
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (document, embedding))| ChunkRecord {
                id: stable_id(docset_id, source, i),
                document,
                meta: ChunkMeta {
                    docset_id: docset_id.to_string(),
                    source: source.to_string(),
                    chunk: i as i64,
                },
                embedding,
            })
            .collect();

        self.store.upsert(&self.collection, &records).await?;
        info!("Indexed {} chunks from {}", records.len(), source);
        Ok(records.len())
    }

    /// Nearest chunks of a docset to the question, best first.
    #[instrument(skip(self, question), fields(collection = %self.collection))]
    pub async fn query(
        &self,
        docset_id: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<QueryHit>, StudyError> {
        let query = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<(f32, QueryHit)> = self
            .store
            .docset_chunks(&self.collection, docset_id, None)
            .await?
            .into_iter()
            .map(|chunk| {
                let distance = cosine_distance(&query, &chunk.embedding);
                let hit = QueryHit {
                    text: chunk.document,
                    source: chunk.meta.source,
                    chunk: chunk.meta.chunk,
                    score: 1.0 - distance,
                };
                (distance, hit)
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        debug!("Query matched {} candidate chunks", scored.len());
        Ok(scored.into_iter().take(top_k).map(|(_, hit)| hit).collect())
    }

    /// Every stored chunk of a docset, in insertion order.
    pub async fn get_all_for_docset(
        &self,
        docset_id: &str,
        limit: Option<usize>,
    ) -> Result<(Vec<String>, Vec<ChunkMeta>), StudyError> {
        let limit = limit.filter(|l| *l > 0);
        let chunks = self
            .store
            .docset_chunks(&self.collection, docset_id, limit)
            .await?;
        Ok(chunks.into_iter().map(|c| (c.document, c.meta)).unzip())
    }

    pub async fn delete_collection(self) -> Result<bool, StudyError> {
        self.store.delete_collection(&self.collection).await
    }
}
