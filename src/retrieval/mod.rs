// Retrieval module
// Reranks vector-search candidates with maximal marginal relevance so the
// context handed to the language model is relevant but not repetitive.


use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest neighbors fetched from the index before reranking.
    pub fetch_pool: usize,
    /// Number of chunks kept after reranking.
    pub select_count: usize,
    /// Weight on query relevance; the remainder weights diversity.
    /// 1.0 is pure nearest-neighbor ranking, 0.0 is pure diversity.
    pub relevance_weight: f32,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            fetch_pool: 40,
            select_count: 8,
            relevance_weight: 0.8,
        }
    }
}

/// A chunk returned by the vector index, with its stored vector so the
/// reranker can measure similarity between candidates.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub content: String,
    pub page: u32,
    pub chunk_index: u32,
    pub vector: Vec<f32>,
    pub distance: f32,
}

#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 { 0.0 } else { dot / denom }
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Select a diverse subset of candidates with maximal marginal relevance.
///
/// Each round picks the candidate maximizing
/// `λ × sim(query, candidate) - (1-λ) × max(sim(candidate, selected))`
/// where λ is [`RetrievalConfig::relevance_weight`]. The first pick is always
/// the most query-similar candidate; later picks trade relevance against
/// similarity to what is already selected.
#[inline]
pub fn select_diverse(
    query: &[f32],
    candidates: Vec<ScoredChunk>,
    config: &RetrievalConfig,
) -> Vec<ScoredChunk> {
    let k = config.select_count.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }

    let lambda = config.relevance_weight;
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, &c.vector))
        .collect();

    let mut remaining: Vec<(ScoredChunk, f32)> =
        candidates.into_iter().zip(relevance).collect();
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(k);

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, (candidate, query_sim)) in remaining.iter().enumerate() {
            let max_selected_sim = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.vector, &s.vector))
                .fold(f32::NEG_INFINITY, f32::max);

            let score = if selected.is_empty() {
                *query_sim
            } else {
                lambda * query_sim - (1.0 - lambda) * max_selected_sim
            };

            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        let (candidate, _) = remaining.swap_remove(best_idx);
        selected.push(candidate);
    }

    debug!(
        "Selected {} of {} candidates (relevance weight {})",
        selected.len(),
        selected.len() + remaining.len(),
        lambda
    );

    selected
}
