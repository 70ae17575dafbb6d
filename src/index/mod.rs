// Vector index module
// Persists embedded chunks in a per-document LanceDB index.

#[cfg(test)]
mod tests;

pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunking::DocumentChunk;

pub use vector_store::VectorStore;

/// Name of the LanceDB table holding a document's chunks.
#[inline]
pub fn collection_name(document_id: &str) -> String {
    format!("manual_{}", document_id)
}

/// A chunk with its embedding, ready for insertion into the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier for this row
    pub id: String,
    /// The chunk's embedding vector
    pub vector: Vec<f32>,
    /// The chunk text
    pub content: String,
    /// 1-based page the chunk came from
    pub page: u32,
    /// Position of the chunk within the document
    pub chunk_index: u32,
    /// Timestamp when this record was created
    pub created_at: String,
}

impl ChunkRecord {
    #[inline]
    pub fn new(chunk: DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            content: chunk.content,
            page: chunk.page,
            chunk_index: chunk.chunk_index as u32,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
