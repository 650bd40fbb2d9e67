use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata stored alongside every indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ChunkMeta {
    pub docset_id: String,
    pub source: String,
    pub chunk: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct QueryHit {
    pub text: String,
    pub source: String,
    pub chunk: i64,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocsetsResponse {
    pub docsets: Vec<String>,
    pub metas: Vec<ChunkMeta>,
}
