// Embeddings module
// Maps chunk and query text into fixed-dimension vectors.

pub mod ollama;

use anyhow::Result;

pub use ollama::OllamaClient;

/// Seam between the pipeline and the embedding backend.
///
/// Vectors compared for similarity must come from the same implementation
/// and model; the model name is part of the index identity.
///
/// Implementations are shared with background indexing tasks, hence the
/// `Send + Sync` bound.
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts, one vector per input in order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Name of the model producing these vectors.
    fn model_name(&self) -> &str;
}
