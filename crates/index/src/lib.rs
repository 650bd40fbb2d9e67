pub mod embedder;
pub mod rag;
pub mod similarity;
pub mod store;

pub use embedder::{embedder_from_config, Embedder, HashingEmbedder, OpenAiEmbedder};
pub use rag::{RagIndex, DEFAULT_TOP_K};
pub use store::{ChunkRecord, IndexStore, StoredChunk};
