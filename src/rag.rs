use crate::answer::{Answer, AnswerComposer};
use crate::chunking::Chunker;
use crate::config::AppConfig;
use crate::document::pdf_bytes_to_text;
use crate::embeddings::{embed_checked, Embedder};
use crate::error::Result;
use crate::generation::Generator;
use crate::index::{IndexEntry, VectorIndex};
use crate::retriever::Retriever;
use crate::usage::UsageTracker;
use log::info;
use std::sync::Arc;

/// Outcome of one ingestion call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks: usize,
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    composer: AnswerComposer,
    default_k: usize,
}

impl RagEngine {
    /// Create a new RAG engine from explicit collaborators
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;

        let chunker = Chunker::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;
        // Queries go through the same embedder as ingestion
        let retriever = Retriever::new(embedder.clone(), index.clone())
            .with_min_score(config.retrieval.min_score);
        let composer = AnswerComposer::new(generator, UsageTracker::new(config.pricing));

        Ok(RagEngine {
            chunker,
            embedder,
            index,
            retriever,
            composer,
            default_k: config.retrieval.top_k,
        })
    }

    /// Number of chunks retrieved when the caller does not choose
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self, collection: &str) -> Result<bool> {
        self.index.collection_exists(collection).await
    }

    /// Ingest an uploaded PDF into `collection`
    pub async fn ingest(&self, document_bytes: &[u8], collection: &str) -> Result<IngestReport> {
        let text = pdf_bytes_to_text(document_bytes)?;
        self.ingest_text(&text, collection).await
    }

    /// Chunk text, embed the chunks and store them in `collection`
    pub async fn ingest_text(&self, text: &str, collection: &str) -> Result<IngestReport> {
        let chunks = self.chunker.split(text);
        info!("Split into {} chunks", chunks.len());

        if chunks.is_empty() {
            return Ok(IngestReport { chunks: 0 });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embed_checked(self.embedder.as_ref(), &texts).await?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::new(chunk, embedding))
            .collect();
        let count = entries.len();

        self.index
            .upsert(collection, self.embedder.space(), entries)
            .await?;
        info!("Stored {} chunks in collection {}", count, collection);

        Ok(IngestReport { chunks: count })
    }

    /// Answer `question` from the `k` most relevant chunks of `collection`
    pub async fn query(&self, question: &str, collection: &str, k: usize) -> Result<Answer> {
        let retrieved = self.retriever.retrieve(collection, question, k).await?;

        if retrieved.is_empty() {
            info!("No relevant information found in {}", collection);
        }

        self.composer
            .answer(question, retrieved.into_chunks())
            .await
    }
}
