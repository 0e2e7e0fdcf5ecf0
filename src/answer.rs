use crate::chunking::Chunk;
use crate::error::Result;
use crate::generation::Generator;
use crate::usage::{UsageRecord, UsageTracker};
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// Reply the generator is told to give when the excerpts are insufficient
pub const UNKNOWN_ANSWER: &str = "I don't know";

/// A generated answer and the chunks it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Exactly the chunks passed to the composer, in retrieval order
    pub grounding_chunks: Vec<Chunk>,
    pub usage: UsageRecord,
}

/// Builds grounded prompts and turns them into answers with one generation call
#[derive(Clone)]
pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
    tracker: UsageTracker,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn Generator>, tracker: UsageTracker) -> Self {
        AnswerComposer { generator, tracker }
    }

    /// The single prompt sent for `question`
    pub fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
        let excerpts = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n\n");

        format!(
            "You are an assistant that answers questions about uploaded PDF documents.\n\
             \n\
             Answer the following question: {question}\n\
             \n\
             Use only the following document excerpts:\n\
             <excerpts>\n{excerpts}\n</excerpts>\n\
             \n\
             Use only information from the excerpts above. If they do not contain the answer, \
             reply with \"{unknown}\".\n\
             Your answers should be detailed, clear and concise.",
            question = question,
            excerpts = excerpts,
            unknown = UNKNOWN_ANSWER,
        )
    }

    /// Answer `question` from `chunks`.
    ///
    /// Calls the generator exactly once. On failure no answer is produced.
    pub async fn answer(&self, question: &str, chunks: Vec<Chunk>) -> Result<Answer> {
        let prompt = Self::build_prompt(question, &chunks);

        let (text, usage) = self
            .tracker
            .wrap(
                self.generator.model(),
                &prompt,
                self.generator.generate(&prompt),
            )
            .await?;
        info!(
            "Answered from {} chunks using {} tokens",
            chunks.len(),
            usage.total_tokens
        );

        Ok(Answer {
            text: text.trim().to_string(),
            grounding_chunks: chunks,
            usage,
        })
    }
}
