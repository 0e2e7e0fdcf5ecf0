use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token counts reported by the provider for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Output of a single generation call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    /// `None` when the provider did not report token counts
    pub usage: Option<TokenUsage>,
}

/// Produces text from a prompt
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model name, used for usage accounting
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError>;
}
