use super::{
    check_k, check_space, cosine_similarity, IndexEntry, RetrievalResult, ScoredChunk, VectorIndex,
};
use crate::embeddings::{Embedding, EmbeddingSpace};
use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Collection {
    space: EmbeddingSpace,
    entries: Vec<IndexEntry>,
}

/// Vector index held in process memory.
///
/// Search is an exact linear scan. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored in `collection`
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.entries.len())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(
        &self,
        collection: &str,
        space: &EmbeddingSpace,
        entries: Vec<IndexEntry>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in &entries {
            space.check(&entry.vector)?;
        }

        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(collection) {
            check_space(collection, &existing.space, space)?;
        }

        let stored = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                space: space.clone(),
                entries: Vec::new(),
            });
        let count = entries.len();
        stored.entries.extend(entries);

        debug!("Stored {} entries in memory collection {}", count, collection);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &Embedding,
        k: usize,
    ) -> Result<RetrievalResult> {
        check_k(k)?;

        let collections = self.collections.read().await;
        let Some(stored) = collections.get(collection) else {
            return Ok(RetrievalResult::empty());
        };
        stored.space.check(query)?;

        let mut hits: Vec<ScoredChunk> = stored
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.vector.values, &query.values),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);

        Ok(RetrievalResult::new(hits))
    }

    async fn collection_space(&self, collection: &str) -> Result<Option<EmbeddingSpace>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.space.clone()))
    }
}
