//! Embedder client abstraction.
//!
//! The embedding capability is a black box: text in, fixed-length vector out.
//! The model and dimension must stay consistent within a deployment or stored
//! vectors become incomparable; [`EmbedderClient::dim`] exposes the
//! dimension so callers can verify it against configuration.
//!
//! # Implementations
//! - [`openai::OpenAiEmbedder`]: any OpenAI-compatible embeddings endpoint.

pub mod openai;

use crate::errors::Result;

/// A vector embedding (f32 components).
pub type Embedding = Vec<f32>;

/// Trait for text-to-vector embedding clients.
#[allow(async_fn_in_trait)]
pub trait EmbedderClient: Send + Sync {
    /// Generate an embedding for a single text string.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Returns the dimensionality of embeddings produced by this client.
    fn dim(&self) -> usize;
}
