pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod index;
pub mod rag;
pub mod retriever;
pub mod usage;

pub use answer::{Answer, AnswerComposer};
pub use chunking::{split, Chunk, Chunker};
pub use config::AppConfig;
pub use embeddings::{Embedder, Embedding, EmbeddingSpace};
pub use error::{GenerationError, RagError, Result};
pub use generation::{Generation, Generator, TokenUsage};
pub use index::{InMemoryIndex, QdrantIndex, RetrievalResult, ScoredChunk, VectorIndex};
pub use rag::{IngestReport, RagEngine};
pub use retriever::Retriever;
pub use usage::{Pricing, UsageRecord, UsageTracker};
