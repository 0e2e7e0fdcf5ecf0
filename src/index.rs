//! Vector index abstraction and the types flowing through it.

use crate::chunking::Chunk;
use crate::embeddings::{Embedding, EmbeddingSpace};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

/// A chunk and its vector, stored under a unique id.
///
/// The collection is chosen by the `upsert` call that stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Embedding,
    pub chunk: Chunk,
}

impl IndexEntry {
    /// Create an entry with a fresh id, so upserts never replace existing points
    pub fn new(chunk: Chunk, vector: Embedding) -> Self {
        IndexEntry {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            chunk,
        }
    }
}

/// A retrieved chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Search hits, most similar first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    /// Wrap hits, sorting them by descending score
    pub fn new(mut hits: Vec<ScoredChunk>) -> Self {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        RetrievalResult { hits }
    }

    pub fn empty() -> Self {
        RetrievalResult::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[ScoredChunk] {
        &self.hits
    }

    pub fn scores(&self) -> Vec<f32> {
        self.hits.iter().map(|hit| hit.score).collect()
    }

    /// Keep only the hits scoring at least `min_score`
    pub fn above(self, min_score: f32) -> Self {
        RetrievalResult {
            hits: self
                .hits
                .into_iter()
                .filter(|hit| hit.score >= min_score)
                .collect(),
        }
    }

    /// Drop the scores, keeping retrieval order
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.hits.into_iter().map(|hit| hit.chunk).collect()
    }
}

/// Storage for chunk vectors with nearest-neighbour search
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store entries in `collection`, creating it tagged with `space` if needed.
    ///
    /// Fails with [`RagError::EmbeddingSpaceMismatch`] when the collection was
    /// built from another space and with [`RagError::DimensionMismatch`] when
    /// any vector has the wrong length. Nothing is written on failure.
    async fn upsert(
        &self,
        collection: &str,
        space: &EmbeddingSpace,
        entries: Vec<IndexEntry>,
    ) -> Result<()>;

    /// The `k` entries most similar to `query`, by cosine similarity.
    ///
    /// An unknown or empty collection yields an empty result.
    async fn search(&self, collection: &str, query: &Embedding, k: usize)
        -> Result<RetrievalResult>;

    /// The embedding space a collection was created with, if it exists
    async fn collection_space(&self, collection: &str) -> Result<Option<EmbeddingSpace>>;

    /// Check if the collection exists
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collection_space(collection).await?.is_some())
    }
}

/// Fail unless `k` asks for at least one result
pub fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::Configuration(
            "k must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Fail unless an upsert into a collection tagged `existing` is allowed for
/// vectors from `incoming`
pub fn check_space(
    collection: &str,
    existing: &EmbeddingSpace,
    incoming: &EmbeddingSpace,
) -> Result<()> {
    if existing.id() != incoming.id() {
        return Err(RagError::EmbeddingSpaceMismatch {
            collection: collection.to_string(),
            expected: existing.id().to_string(),
            actual: incoming.id().to_string(),
        });
    }
    if existing.dimension() != incoming.dimension() {
        return Err(RagError::DimensionMismatch {
            expected: existing.dimension(),
            actual: incoming.dimension(),
        });
    }
    Ok(())
}

/// Compute cosine similarity between two vectors of equal length.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
