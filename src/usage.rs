use crate::chunking::estimate_token_count;
use crate::error::GenerationError;
use crate::generation::{Generation, TokenUsage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::iter::Sum;
use std::ops::Add;

/// USD prices per thousand tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Pricing {
            prompt_per_1k: 0.0001,
            completion_per_1k: 0.0004,
        }
    }
}

impl Pricing {
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        usage.prompt_tokens as f64 / 1000.0 * self.prompt_per_1k
            + usage.completion_tokens as f64 / 1000.0 * self.completion_per_1k
    }
}

/// Accounting for exactly one generation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub successful_requests: u64,
    pub total_cost_usd: f64,
    /// True when token counts were estimated locally
    pub estimated: bool,
}

impl fmt::Display for UsageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.estimated { " (estimated)" } else { "" };
        writeln!(f, "Tokens Used: {}{}", self.total_tokens, marker)?;
        writeln!(f, "\tPrompt Tokens: {}", self.prompt_tokens)?;
        writeln!(f, "\tCompletion Tokens: {}", self.completion_tokens)?;
        writeln!(f, "Successful Requests: {}", self.successful_requests)?;
        write!(f, "Total Cost (USD): ${:.6}", self.total_cost_usd)
    }
}

impl Add for UsageRecord {
    type Output = UsageRecord;

    fn add(self, other: UsageRecord) -> UsageRecord {
        let model = if self.model.is_empty() || self.model == other.model {
            other.model
        } else if other.model.is_empty() {
            self.model
        } else {
            format!("{}+{}", self.model, other.model)
        };

        UsageRecord {
            model,
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            successful_requests: self.successful_requests + other.successful_requests,
            total_cost_usd: self.total_cost_usd + other.total_cost_usd,
            estimated: self.estimated || other.estimated,
        }
    }
}

impl Sum for UsageRecord {
    fn sum<I: Iterator<Item = UsageRecord>>(iter: I) -> Self {
        iter.fold(UsageRecord::default(), Add::add)
    }
}

/// Wraps single generation calls and reports their usage.
///
/// Keeps no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageTracker {
    pricing: Pricing,
}

impl UsageTracker {
    pub fn new(pricing: Pricing) -> Self {
        UsageTracker { pricing }
    }

    /// Await `call` and account for it.
    ///
    /// `prompt` is only used to estimate prompt tokens when the provider
    /// reports no usage. A failed call produces no record.
    pub async fn wrap<F>(
        &self,
        model: &str,
        prompt: &str,
        call: F,
    ) -> Result<(String, UsageRecord), GenerationError>
    where
        F: Future<Output = Result<Generation, GenerationError>>,
    {
        let generation = call.await?;

        let (usage, estimated) = match generation.usage {
            Some(usage) => (usage, false),
            None => {
                warn!("Provider reported no token usage, estimating from text");
                let usage = TokenUsage {
                    prompt_tokens: estimate_token_count(prompt) as u64,
                    completion_tokens: estimate_token_count(&generation.text) as u64,
                };
                (usage, true)
            }
        };

        let record = UsageRecord {
            model: model.to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.prompt_tokens + usage.completion_tokens,
            successful_requests: 1,
            total_cost_usd: self.pricing.cost(usage),
            estimated,
        };
        debug!(
            "Generation usage: {} prompt + {} completion tokens, ${:.6}",
            record.prompt_tokens, record.completion_tokens, record.total_cost_usd
        );

        Ok((generation.text, record))
    }
}
