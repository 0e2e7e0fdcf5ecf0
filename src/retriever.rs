use crate::embeddings::{Embedder, Embedding};
use crate::error::Result;
use crate::index::{check_k, check_space, RetrievalResult, VectorIndex};
use log::{debug, info};
use std::sync::Arc;

/// Finds the chunks most relevant to a question.
///
/// Questions are embedded with the same embedder used at ingestion; a
/// collection built from another embedding space is refused.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Retriever {
            embedder,
            index,
            min_score: None,
        }
    }

    /// Drop hits scoring below `min_score`. Unset, every top-k hit is kept.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Retrieve the `k` chunks closest to `question`, most similar first
    pub async fn retrieve(
        &self,
        collection: &str,
        question: &str,
        k: usize,
    ) -> Result<RetrievalResult> {
        check_k(k)?;

        let Some(stored_space) = self.index.collection_space(collection).await? else {
            info!("Collection {} has no entries", collection);
            return Ok(RetrievalResult::empty());
        };

        let space = self.embedder.space();
        check_space(collection, &stored_space, space)?;

        let question_embedding: Embedding = self.embedder.embed_one(question).await?;
        space.check(&question_embedding)?;

        let result = self.index.search(collection, &question_embedding, k).await?;
        debug!("Scores for {:?}: {:?}", question, result.scores());

        let result = match self.min_score {
            Some(min_score) => result.above(min_score),
            None => result,
        };
        info!("Retrieved {} chunks from {}", result.len(), collection);

        Ok(result)
    }
}
