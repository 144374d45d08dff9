//! In-memory vector index.
//!
//! Holds one embedding per [`Chunk`] and answers top-k queries by brute-force
//! cosine similarity. The index is immutable once built: any change to the
//! set of uploaded files produces a new index from scratch.

use tracing::info;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::error::AppError;
use crate::models::Chunk;

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// A chunk returned from a query, with its similarity to the query text.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    model: String,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("entries", &self.entries.len())
            .field("model", &self.model)
            .finish()
    }
}

impl VectorIndex {
    /// Embeds every chunk, `batch_size` texts per embedder call.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self, AppError> {
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder
                .embed(&texts)
                .await
                .map_err(|e| AppError::external("embedding", e.to_string()))?;
            if vectors.len() != batch.len() {
                return Err(AppError::external(
                    "embedding",
                    format!(
                        "expected {} vectors, got {}",
                        batch.len(),
                        vectors.len()
                    ),
                ));
            }
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexEntry { chunk, vector }),
            );
        }

        info!(
            entries = entries.len(),
            model = embedder.model_name(),
            "built vector index"
        );
        Ok(Self {
            entries,
            model: embedder.model_name().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Top `k` entries by similarity to `vector`, best first. Equal scores
    /// keep insertion order; a NaN score ranks below every finite one.
    pub fn search(&self, vector: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: rank_score(cosine_similarity(&entry.vector, vector)),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// Embeds `text` and returns the `k` nearest chunks.
    pub async fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        let vector = embed_query(embedder, text)
            .await
            .map_err(|e| AppError::external("embedding", e.to_string()))?;
        Ok(self.search(&vector, k))
    }
}

fn rank_score(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
