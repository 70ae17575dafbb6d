// Answering module
// Turns a question into a grounded answer: embed the question, pull a
// candidate pool from the index, rerank for diversity, and hand the selected
// chunks to the language model as context.


use anyhow::Result as AnyResult;
use tracing::{debug, warn};

use crate::retrieval::RetrievalConfig;
use crate::embeddings::{Embedder, OllamaClient};
use crate::index::VectorStore;
use crate::retrieval::{ScoredChunk, select_diverse};
use crate::{ManualQaError, Result};

const PROMPT_TEMPLATE: &str = "\
You are an assistant answering questions about a product manual.

Use ONLY the excerpts below to answer. If the excerpts do not contain enough \
information, say that the manual does not cover it; never invent details. \
Answer in the same language the manual is written in.

Manual excerpts:
{context}

Question: {question}

Answer:";

/// Seam between the answering flow and the generation backend.
pub trait LanguageModel: Send + Sync {
    /// Produce a completion for a fully assembled prompt.
    fn complete(&self, prompt: &str) -> AnyResult<String>;

    /// Name of the model producing completions.
    fn model_name(&self) -> &str;
}

impl LanguageModel for OllamaClient {
    #[inline]
    fn complete(&self, prompt: &str) -> AnyResult<String> {
        self.generate(prompt)
    }

    #[inline]
    fn model_name(&self) -> &str {
        self.language_model()
    }
}

/// A chunk cited as evidence for an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChunk {
    pub page: u32,
    pub content: String,
}

/// An answer with the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub text: String,
    pub sources: Vec<SourceChunk>,
}

/// Assemble the generation prompt from the selected chunks.
fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| format!("[page {}]\n{}", c.page, c.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    PROMPT_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question)
}

async fn try_answer(
    question: &str,
    store: &VectorStore,
    embedder: &dyn Embedder,
    model: &dyn LanguageModel,
    retrieval: &RetrievalConfig,
) -> Result<ChatAnswer> {
    let query_vector = embedder
        .embed_query(question)
        .map_err(|e| ManualQaError::Embedding(format!("{:#}", e)))?;

    let pool = store
        .search_similar(&query_vector, retrieval.fetch_pool)
        .await?;
    debug!("Fetched pool of {} candidates", pool.len());

    let selected = select_diverse(&query_vector, pool, retrieval);
    if selected.is_empty() {
        return Err(ManualQaError::Index(
            "The index returned no chunks for this question".to_string(),
        ));
    }

    let prompt = build_prompt(question, &selected);
    let text = model
        .complete(&prompt)
        .map_err(|e| ManualQaError::Model(format!("{:#}", e)))?;

    let sources = selected
        .into_iter()
        .map(|c| SourceChunk {
            page: c.page,
            content: c.content,
        })
        .collect();

    Ok(ChatAnswer {
        text: text.trim().to_string(),
        sources,
    })
}

/// Answer a question about the loaded manual.
///
/// Failures never propagate out of the chat loop: any error is folded into a
/// degraded answer carrying the technical detail, with no sources attached.
#[inline]
pub async fn answer(
    question: &str,
    store: &VectorStore,
    embedder: &dyn Embedder,
    model: &dyn LanguageModel,
    retrieval: &RetrievalConfig,
) -> ChatAnswer {
    match try_answer(question, store, embedder, model, retrieval).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Answer generation failed: {}", e);
            ChatAnswer {
                text: format!(
                    "Sorry, I could not produce an answer right now.\n\nTechnical details: {}",
                    e
                ),
                sources: Vec::new(),
            }
        }
    }
}
