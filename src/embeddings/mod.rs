// Embeddings module
// Text splitting for ingestion and the embedding service client

pub mod chunking;
pub mod openai;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{ChunkingConfig, RecursiveSplitter, split_text};
pub use openai::OpenAiEmbedder;

/// Turns text into a vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`.
    ///
    /// `Ok(None)` means the service answered but the answer held no usable
    /// vector (missing, empty or of the wrong length). Transport failures and
    /// rejected requests are errors.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>>;

    /// Length of the vectors this embedder produces
    fn dimension(&self) -> usize;
}
