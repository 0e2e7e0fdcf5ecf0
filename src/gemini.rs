use crate::embeddings::{Embedder, Embedding, EmbeddingSpace};
use crate::error::{GenerationError, RagError, Result};
use crate::generation::{Generation, Generator, TokenUsage};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for Gemini API
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub generation_model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Configuration with default models and endpoints
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            embedding_model: "models/text-embedding-004".to_string(),
            embedding_dimension: 768,
            generation_model: "models/gemini-2.0-flash".to_string(),
            temperature: 0.3,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }

    fn embed_url(&self) -> String {
        format!(
            "{}/{}:embedContent?key={}",
            self.api_base.trim_end_matches('/'),
            self.embedding_model,
            self.api_key
        )
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.api_base.trim_end_matches('/'),
            self.generation_model,
            self.api_key
        )
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
    space: EmbeddingSpace,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        let space = EmbeddingSpace::new(
            "gemini",
            &config.embedding_model,
            config.embedding_dimension,
        );

        Ok(GeminiClient {
            config,
            client,
            space,
        })
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            content: EmbeddingContent {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(self.config.embed_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "API request failed: {} {}",
                status, error_text
            )));
        }

        let response_data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("malformed response: {}", e)))?;

        Ok(Embedding {
            values: response_data.embedding.values,
        })
    }

    /// Generate text for a prompt with the configured model
    pub async fn generate_text(
        &self,
        prompt: &str,
    ) -> std::result::Result<Generation, GenerationError> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.config.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(GenerationError::QuotaExceeded(error_text));
            }
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let body = response.text().await.map_err(request_error)?;
        parse_generate_response(&body)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.get_embedding(text).await?);
        }
        debug!("Embedded {} texts", embeddings.len());
        Ok(embeddings)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    fn model(&self) -> &str {
        &self.config.generation_model
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<Generation, GenerationError> {
        self.generate_text(prompt).await
    }
}

fn request_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(e.to_string())
    } else {
        GenerationError::Provider {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            body: e.to_string(),
        }
    }
}

/// Extract the answer text and token usage from a `generateContent` body
fn parse_generate_response(body: &str) -> std::result::Result<Generation, GenerationError> {
    let response_data: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    let text = response_data
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<String>>()
                .join("")
        })
        .filter(|text| !text.is_empty())
        .ok_or_else(|| GenerationError::MalformedResponse("No response generated".to_string()))?;

    let usage = response_data.usage_metadata.and_then(|meta| {
        let prompt_tokens = meta.prompt_token_count?;
        let completion_tokens = meta
            .candidates_token_count
            .or_else(|| meta.total_token_count.map(|t| t.saturating_sub(prompt_tokens)))?;
        Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
        })
    });

    Ok(Generation { text, usage })
}

// Shared request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: EmbeddingContent<'a>,
}

#[derive(Serialize)]
struct EmbeddingContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role,
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}
