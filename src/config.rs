use crate::error::{RagError, Result};
use crate::gemini::GeminiConfig;
use crate::usage::Pricing;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Connection settings for the vector index service
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Index endpoint. Only required for the Qdrant backend.
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Logical database; prefixes every physical collection name
    pub database_name: String,
    /// Collection used when the caller does not name one
    pub collection_name: String,
}

impl IndexConfig {
    /// The Qdrant endpoint, required once a remote index is used
    pub fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| RagError::Configuration("QDRANT_URL is not set".to_string()))
    }
}

/// Chunking and retrieval parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Drop retrieved chunks scoring below this; `None` keeps plain top-k
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 2,
            min_score: None,
        }
    }
}

/// Process-wide configuration, built once at startup and passed into
/// every component constructor
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub index: IndexConfig,
    pub gemini: GeminiConfig,
    pub retrieval: RetrievalConfig,
    pub pricing: Pricing,
}

impl AppConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let index = IndexConfig {
            url: get("QDRANT_URL"),
            api_key: get("QDRANT_API_KEY"),
            database_name: get("RAG_DATABASE").unwrap_or_else(|| "default".to_string()),
            collection_name: get("RAG_COLLECTION").unwrap_or_else(|| "documents".to_string()),
        };

        let api_key = get("GEMINI_API_KEY").ok_or_else(|| {
            RagError::Configuration("GEMINI_API_KEY is not set".to_string())
        })?;
        let defaults = GeminiConfig::new(api_key);
        let gemini = GeminiConfig {
            api_base: get("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            embedding_model: get("GEMINI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dimension: parse(&get, "GEMINI_EMBEDDING_DIMENSION")?
                .unwrap_or(defaults.embedding_dimension),
            generation_model: get("GEMINI_GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            temperature: parse(&get, "GEMINI_TEMPERATURE")?.unwrap_or(defaults.temperature),
            timeout: parse::<u64, _>(&get, "GEMINI_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            ..defaults
        };

        let retrieval_defaults = RetrievalConfig::default();
        let retrieval = RetrievalConfig {
            chunk_size: parse(&get, "RAG_CHUNK_SIZE")?.unwrap_or(retrieval_defaults.chunk_size),
            chunk_overlap: parse(&get, "RAG_CHUNK_OVERLAP")?
                .unwrap_or(retrieval_defaults.chunk_overlap),
            top_k: parse(&get, "RAG_TOP_K")?.unwrap_or(retrieval_defaults.top_k),
            min_score: parse(&get, "RAG_MIN_SCORE")?,
        };

        let pricing_defaults = Pricing::default();
        let pricing = Pricing {
            prompt_per_1k: parse(&get, "RAG_PROMPT_PRICE_PER_1K")?
                .unwrap_or(pricing_defaults.prompt_per_1k),
            completion_per_1k: parse(&get, "RAG_COMPLETION_PRICE_PER_1K")?
                .unwrap_or(pricing_defaults.completion_per_1k),
        };

        let config = AppConfig {
            index,
            gemini,
            retrieval,
            pricing,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check parameter combinations that no component could work with
    pub fn validate(&self) -> Result<()> {
        let retrieval = &self.retrieval;
        if retrieval.chunk_overlap == 0 || retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(RagError::Configuration(format!(
                "RAG_CHUNK_OVERLAP ({}) must be greater than zero and less than RAG_CHUNK_SIZE ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }
        if retrieval.top_k == 0 {
            return Err(RagError::Configuration(
                "RAG_TOP_K must be at least 1".to_string(),
            ));
        }
        if self.gemini.embedding_dimension == 0 {
            return Err(RagError::Configuration(
                "GEMINI_EMBEDDING_DIMENSION must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

}

fn parse<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                RagError::Configuration(format!("invalid value for {}: '{}' ({})", key, raw, e))
            })
        })
        .transpose()
}
