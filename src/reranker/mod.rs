//! Cross-encoder reranking abstraction.
//!
//! Signal fusion alone is noisy at the boundary between related-but-irrelevant
//! and relevant results; the reranker is the precision backstop. It is a black
//! box: given the query and a candidate text, return a refined relevance
//! score. Test suites substitute deterministic fakes.
//!
//! # Implementations
//! - [`llm::LlmReranker`]: scores passages through any [`LlmClient`].

pub mod llm;

use crate::errors::Result;

/// Trait for cross-encoder-style relevance scorers.
#[allow(async_fn_in_trait)]
pub trait RerankerClient: Send + Sync {
    /// Score each passage's relevance to `query`.
    ///
    /// Returns one score in `[0, 1]` per passage, in input order.
    async fn rank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}
