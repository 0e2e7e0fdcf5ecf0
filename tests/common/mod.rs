//! Deterministic stand-ins for the embedding, generation and index services.

#![allow(dead_code)]

use async_trait::async_trait;
use pdf_rag::config::AppConfig;
use pdf_rag::embeddings::{Embedder, Embedding, EmbeddingSpace};
use pdf_rag::error::{GenerationError, Result};
use pdf_rag::generation::{Generation, Generator, TokenUsage};
use pdf_rag::index::{IndexEntry, InMemoryIndex, RetrievalResult, VectorIndex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const DIM: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed into one of `DIM` buckets
pub struct HashEmbedder {
    space: EmbeddingSpace,
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(model: &str) -> Self {
        HashEmbedder {
            space: EmbeddingSpace::new("hash", model, DIM),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut values = vec![0.0; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % DIM;
            values[bucket] += 1.0;
        }
        values
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| Embedding::new(Self::vector(text)))
            .collect())
    }
}

/// Generator returning a fixed reply (or error) and recording every prompt
pub struct ScriptedGenerator {
    reply: std::result::Result<String, fn() -> GenerationError>,
    usage: Option<TokenUsage>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        ScriptedGenerator {
            reply: Ok(text.to_string()),
            usage: Some(TokenUsage {
                prompt_tokens: 400,
                completion_tokens: 20,
            }),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: fn() -> GenerationError) -> Self {
        ScriptedGenerator {
            reply: Err(error),
            usage: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<Generation, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(Generation {
                text: text.clone(),
                usage: self.usage,
            }),
            Err(make_error) => Err(make_error()),
        }
    }
}

/// In-memory index that counts the calls made against it
#[derive(Default)]
pub struct CountingIndex {
    pub inner: InMemoryIndex,
    pub upserts: AtomicUsize,
    pub searches: AtomicUsize,
}

impl CountingIndex {
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn upsert(
        &self,
        collection: &str,
        space: &EmbeddingSpace,
        entries: Vec<IndexEntry>,
    ) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(collection, space, entries).await
    }

    async fn search(
        &self,
        collection: &str,
        query: &Embedding,
        k: usize,
    ) -> Result<RetrievalResult> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(collection, query, k).await
    }

    async fn collection_space(&self, collection: &str) -> Result<Option<EmbeddingSpace>> {
        self.inner.collection_space(collection).await
    }
}

/// Configuration with the given chunking and defaults elsewhere
pub fn config(chunk_size: usize, chunk_overlap: usize) -> AppConfig {
    let mut config = AppConfig::from_lookup(|key| match key {
        "GEMINI_API_KEY" => Some("test-key".to_string()),
        _ => None,
    })
    .unwrap();
    config.retrieval.chunk_size = chunk_size;
    config.retrieval.chunk_overlap = chunk_overlap;
    config
}

/// Exactly 3000 ASCII characters in four 750-character sections, each about
/// a different subject
pub fn sample_document() -> String {
    let sections = [
        "Alpha is the first letter of the Greek alphabet and Alpha marks beginnings. ",
        "Beta measures volatility in finance and Beta tests precede releases. ",
        "Gamma rays are high energy photons and Gamma decay emits them. ",
        "Delta is where a river meets the sea and Delta also means change. ",
    ];

    let mut text = String::new();
    for section in sections {
        let mut part = String::new();
        while part.len() < 750 {
            part.push_str(section);
        }
        text.push_str(&part[..750]);
    }
    text
}

/// A two-page PDF: the first page shows `text` in Helvetica, the second is blank
pub fn two_page_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 6 0 R >>"
            .to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << >> /Contents 7 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Length 0 >>\nstream\n\nendstream".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}
