//! LLM-backed cross-encoder reranker.
//!
//! Scores each passage against the query in a single structured-output call,
//! mirroring the cross-encoder clients the Python ecosystem pairs with
//! temporal knowledge graphs.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{MemoryError, Result};
use crate::llm_client::{LlmClient, Message};
use crate::prompts;
use crate::utils::truncate_with_ellipsis;

use super::RerankerClient;

/// Passages longer than this are truncated before being sent to the model.
const MAX_PASSAGE_CHARS: usize = 500;

/// Structured reranking response: one relevance score per passage.
#[derive(Debug, Deserialize, JsonSchema)]
struct RerankResponse {
    /// Relevance scores in `0..=100`, one per passage, in input order.
    scores: Vec<u8>,
}

/// Reranker that delegates scoring to an [`LlmClient`].
pub struct LlmReranker<L: LlmClient> {
    llm: L,
}

impl<L: LlmClient> LlmReranker<L> {
    pub fn new(llm: L) -> Self {
        Self { llm }
    }

    fn build_prompt(query: &str, passages: &[String]) -> String {
        let mut prompt = format!("QUERY: {query}\n\nPASSAGES:\n");
        for (i, passage) in passages.iter().enumerate() {
            let text = truncate_with_ellipsis(passage, MAX_PASSAGE_CHARS);
            prompt.push_str(&format!("{i}. {text}\n"));
        }
        prompt
    }
}

impl<L: LlmClient> RerankerClient for LlmReranker<L> {
    async fn rank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let messages = [
            Message::system(prompts::RERANK_SYSTEM),
            Message::user(Self::build_prompt(query, passages)),
        ];

        let response: RerankResponse = self
            .llm
            .generate_structured(&messages)
            .await
            .map_err(|e| MemoryError::Rerank(e.to_string()))?;

        if response.scores.len() != passages.len() {
            return Err(MemoryError::Rerank(format!(
                "expected {} scores, got {}",
                passages.len(),
                response.scores.len()
            )));
        }

        debug!(passages = passages.len(), "reranked candidate passages");

        Ok(response
            .scores
            .into_iter()
            .map(|s| f32::from(s.min(100)) / 100.0)
            .collect())
    }
}
