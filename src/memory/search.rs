use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{DEFAULT_MAX_CHUNKS_PER_FILE, DEFAULT_MIN_SCORE, DEFAULT_RETRIEVAL_K};

use super::manager::EmbeddedChunk;

/// Relevance weight in the MMR objective; `1 - MMR_LAMBDA` weighs redundancy.
pub const MMR_LAMBDA: f64 = 0.7;

/// The MMR pool holds this many candidates per requested hit.
pub const MMR_OVERSAMPLE: usize = 3;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// Options that control a semantic retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query: String,
    /// Maximum number of hits.
    pub k: usize,
    /// Restrict candidates to these documents; empty means the whole index.
    pub within_paths: Vec<String>,
    /// At most this many hits from one document.
    pub max_chunks_per_file: usize,
    /// Candidates scoring below this are discarded.
    pub min_score: f64,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: DEFAULT_RETRIEVAL_K,
            within_paths: Vec::new(),
            max_chunks_per_file: DEFAULT_MAX_CHUNKS_PER_FILE,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// One retrieved chunk. The embedding vector is never included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub path: String,
    pub score: f64,
    pub start: usize,
    pub end: usize,
    pub index: usize,
    pub text: String,
}

/// `{query, hits}` on success, `{error, hits: []}` when the index is not ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalResponse {
    pub fn hits(query: impl Into<String>, hits: Vec<RetrievalHit>) -> Self {
        Self {
            query: Some(query.into()),
            error: None,
            hits,
        }
    }

    pub fn not_ready() -> Self {
        Self {
            query: None,
            error: Some(
                "Semantic index is not ready; run the `index` command to build it first".to_string(),
            ),
            hits: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Cosine similarity of two vectors.
///
/// Returns `0.0` for vectors of different length or with zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A chunk scored against the query.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub path: &'a str,
    pub chunk: &'a EmbeddedChunk,
    pub score: f64,
}

/// Order candidates by Maximal Marginal Relevance.
///
/// `candidates` must already be sorted by descending score. The first one
/// seeds the selection; each following pick maximises
/// `lambda * score - (1 - lambda) * max_similarity_to_selected`. Ties keep the
/// earlier candidate. Returns indices into `candidates` in pick order.
pub fn mmr_order(candidates: &[Candidate<'_>], lambda: f64) -> Vec<usize> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut selected = vec![0usize];
    let mut remaining: Vec<usize> = (1..candidates.len()).collect();

    while !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_value = f64::NEG_INFINITY;

        for (pos, &i) in remaining.iter().enumerate() {
            let max_sim = selected
                .iter()
                .map(|&s| cosine_similarity(&candidates[i].chunk.embedding, &candidates[s].chunk.embedding))
                .fold(f64::NEG_INFINITY, f64::max);
            let value = lambda * candidates[i].score - (1.0 - lambda) * max_sim;
            if value > best_value {
                best_value = value;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

/// Walk `ordered` admitting at most `max_per_source` hits per path, up to `k`.
pub fn cap_per_source<'a, I>(ordered: I, max_per_source: usize, k: usize) -> Vec<Candidate<'a>>
where
    I: IntoIterator<Item = Candidate<'a>>,
{
    let mut per_source: HashMap<&str, usize> = HashMap::new();
    let mut out = Vec::new();

    for candidate in ordered {
        if out.len() >= k {
            break;
        }
        let count = per_source.entry(candidate.path).or_default();
        if *count >= max_per_source {
            continue;
        }
        *count += 1;
        out.push(candidate);
    }

    out
}

/// Score, filter, diversify, and cap the chunks in `pool`.
pub fn rank<'a, I>(query_embedding: &[f32], pool: I, request: &RetrievalRequest) -> Vec<RetrievalHit>
where
    I: IntoIterator<Item = (&'a str, &'a [EmbeddedChunk])>,
{
    let mut scored: Vec<Candidate<'a>> = pool
        .into_iter()
        .flat_map(|(path, chunks)| {
            chunks.iter().map(move |chunk| Candidate {
                path,
                chunk,
                score: cosine_similarity(query_embedding, &chunk.embedding),
            })
        })
        .filter(|c| c.score >= request.min_score)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(request.k.saturating_mul(MMR_OVERSAMPLE));

    let order = mmr_order(&scored, MMR_LAMBDA);
    let picked = cap_per_source(
        order.into_iter().map(|i| scored[i]),
        request.max_chunks_per_file,
        request.k,
    );

    picked
        .into_iter()
        .map(|c| RetrievalHit {
            path: c.path.to_string(),
            score: c.score,
            start: c.chunk.start,
            end: c.chunk.end,
            index: c.chunk.index,
            text: c.chunk.text.clone(),
        })
        .collect()
}
