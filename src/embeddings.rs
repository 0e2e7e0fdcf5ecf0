use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Identity of the vector space an embedder produces.
///
/// Collections are tagged with the space that populated them; querying a
/// collection from a different space is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    id: String,
    dimension: usize,
}

impl EmbeddingSpace {
    /// Build a space id from a provider and model name.
    ///
    /// Characters outside `[A-Za-z0-9_-]` become underscores so the id can be
    /// stored as a vector name in the index.
    pub fn new(provider: &str, model: &str, dimension: usize) -> Self {
        let raw = format!("{}-{}", provider, model);
        EmbeddingSpace::from_id(&raw, dimension)
    }

    /// Rebuild a space from an id read back from the index
    pub fn from_id(id: &str, dimension: usize) -> Self {
        let id = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        EmbeddingSpace { id, dimension }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Fail unless `embedding` has this space's dimension
    pub fn check(&self, embedding: &Embedding) -> Result<()> {
        if embedding.dimension() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }
        Ok(())
    }
}

/// Maps text to fixed-dimension vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The space every vector from this embedder belongs to
    fn space(&self) -> &EmbeddingSpace;

    /// Embed each text, one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed(&[text.to_string()]).await?;
        if embeddings.len() != 1 {
            return Err(RagError::Embedding(format!(
                "expected 1 vector, embedder returned {}",
                embeddings.len()
            )));
        }
        Ok(embeddings.remove(0))
    }
}

/// Embed `texts` and verify the response shape: one vector per text, each of
/// the embedder's declared dimension
pub async fn embed_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Embedding>> {
    let embeddings = embedder.embed(texts).await?;

    if embeddings.len() != texts.len() {
        return Err(RagError::Embedding(format!(
            "expected {} vectors, embedder returned {}",
            texts.len(),
            embeddings.len()
        )));
    }

    for embedding in &embeddings {
        embedder.space().check(embedding)?;
    }

    Ok(embeddings)
}
