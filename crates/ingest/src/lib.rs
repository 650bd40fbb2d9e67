pub mod chunk;
pub mod extract;
pub mod storage;

pub use chunk::*;
pub use extract::{ExtractedFile, Extractor};
pub use storage::*;
