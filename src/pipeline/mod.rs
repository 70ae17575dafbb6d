// Indexing pipeline
// Drives a PDF from raw bytes to a queryable vector index: save, extract,
// chunk, embed, write. The index is built in a staging directory and swapped
// in only after every step succeeds, so a failed rebuild never destroys an
// existing index.

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chunking::chunk_pages;
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::extract::extract_pages_from_bytes;
use crate::index::{ChunkRecord, VectorStore, collection_name};
use crate::store::{document_id, save_upload};
use crate::{ManualQaError, Result};

/// Progress events emitted while a document is being indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexProgress {
    Saving,
    Extracting,
    Chunking,
    Embedding { done: usize, total: usize },
    Writing,
}

/// Everything a caller needs to record about a freshly built index.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub document_id: String,
    pub pdf_path: PathBuf,
    pub index_dir: PathBuf,
    pub collection: String,
    pub embedding_model: String,
    pub page_count: usize,
    pub chunk_count: usize,
}

/// Final location of a document's index.
#[inline]
pub fn index_dir_for(vector_stores_dir: &Path, doc_id: &str) -> PathBuf {
    vector_stores_dir.join(doc_id)
}

/// Scratch location an index is built in before the swap.
#[inline]
pub fn staging_dir_for(vector_stores_dir: &Path, doc_id: &str) -> PathBuf {
    vector_stores_dir.join(format!("{}.staging", doc_id))
}

/// Index a PDF end to end.
///
/// Progress events are best-effort; a dropped receiver never fails the run.
#[inline]
pub async fn index_document(
    bytes: &[u8],
    filename: &str,
    embedder: &dyn Embedder,
    config: &Config,
    progress: Option<&mpsc::UnboundedSender<IndexProgress>>,
) -> Result<IndexOutcome> {
    let report = |event: IndexProgress| {
        if let Some(tx) = progress {
            let _ = tx.send(event);
        }
    };

    if bytes.is_empty() {
        return Err(ManualQaError::Storage("Uploaded file is empty".to_string()));
    }

    let doc_id = document_id(bytes);
    info!("Indexing {} as document {}", filename, doc_id);

    report(IndexProgress::Saving);
    let pdf_path = save_upload(&config.uploads_dir(), bytes, filename)
        .context("Failed to persist upload")?;

    let built = async {
        report(IndexProgress::Extracting);
        let pages = extract_pages_from_bytes(bytes)?;
        let page_count = pages.len();

        report(IndexProgress::Chunking);
        let chunks = chunk_pages(&pages, &config.chunking);
        if chunks.is_empty() {
            return Err(ManualQaError::Extraction(
                "Document produced no text chunks".to_string(),
            ));
        }
        let chunk_count = chunks.len();
        info!("Extracted {} pages into {} chunks", page_count, chunk_count);

        let vector_stores_dir = config.vector_stores_dir();
        let staging_dir = staging_dir_for(&vector_stores_dir, &doc_id);
        let final_dir = index_dir_for(&vector_stores_dir, &doc_id);

        // Leftovers from an interrupted earlier run
        if staging_dir.exists() {
            warn!("Removing stale staging directory {:?}", staging_dir);
            fs::remove_dir_all(&staging_dir)
                .context("Failed to remove stale staging directory")?;
        }

        {
            let mut store = VectorStore::open(&staging_dir, &doc_id).await?;

            let batch_size = config.ollama.batch_size.max(1) as usize;
            let mut done = 0;
            report(IndexProgress::Embedding {
                done,
                total: chunk_count,
            });

            for batch in chunks.chunks(batch_size) {
                let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
                let vectors = embedder
                    .embed_batch(&texts)
                    .map_err(|e| ManualQaError::Embedding(format!("{:#}", e)))?;

                if vectors.len() != batch.len() {
                    return Err(ManualQaError::Embedding(format!(
                        "Embedding backend returned {} vectors for {} chunks",
                        vectors.len(),
                        batch.len()
                    )));
                }

                report(IndexProgress::Writing);
                let records: Vec<ChunkRecord> = batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| ChunkRecord::new(chunk, vector))
                    .collect();
                store.store_chunks(records).await?;

                done += batch.len();
                report(IndexProgress::Embedding {
                    done,
                    total: chunk_count,
                });
            }
        }

        // Swap the finished index into place. The old index survives any
        // failure before this point.
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir).context("Failed to remove previous index")?;
        }
        fs::rename(&staging_dir, &final_dir).context("Failed to move index into place")?;

        Ok((final_dir, page_count, chunk_count))
    }
    .await;

    let (final_dir, page_count, chunk_count) = match built {
        Ok(parts) => parts,
        Err(e) => {
            // Nothing references the upload once indexing has failed.
            if let Err(remove_err) = fs::remove_file(&pdf_path) {
                warn!(
                    "Failed to remove upload {:?} after failed indexing: {}",
                    pdf_path, remove_err
                );
            }
            return Err(e);
        }
    };

    info!("Index for {} ready at {:?}", doc_id, final_dir);

    Ok(IndexOutcome {
        collection: collection_name(&doc_id),
        document_id: doc_id,
        pdf_path,
        index_dir: final_dir,
        embedding_model: embedder.model_name().to_string(),
        page_count,
        chunk_count,
    })
}

/// A background indexing run with a progress channel.
pub struct IndexingJob {
    pub progress: mpsc::UnboundedReceiver<IndexProgress>,
    pub handle: JoinHandle<Result<IndexOutcome>>,
}

impl IndexingJob {
    /// Spawn the pipeline on the runtime, streaming progress to the caller.
    #[inline]
    pub fn spawn(
        bytes: Vec<u8>,
        filename: String,
        embedder: Arc<dyn Embedder>,
        config: Config,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            index_document(&bytes, &filename, embedder.as_ref(), &config, Some(&tx)).await
        });

        Self {
            progress: rx,
            handle,
        }
    }
}
