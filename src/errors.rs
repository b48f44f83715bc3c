//! Error types for engram-rs.

/// Alias for Results returning [`MemoryError`].
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Top-level error type for engram-rs.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A required scope identifier was missing or empty.
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Nothing to extract; episode content was empty or all whitespace.
    #[error("Empty content: nothing to extract")]
    EmptyContent,

    /// The extraction capability failed or returned unusable output.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The embedding capability failed.
    #[error("Embedder error: {0}")]
    Embedder(String),

    /// The cross-encoder reranking capability failed.
    #[error("Reranker error: {0}")]
    Rerank(String),

    /// The backing graph store was unavailable or rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// LLM-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited")]
    RateLimit,

    #[error("Model refused to respond")]
    Refusal,

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("Authentication failed")]
    Authentication,

    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
}
