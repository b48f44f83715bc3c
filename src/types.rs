//! Central configuration and tunable parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

fn validate_embedding_dim(dim: usize) -> Result<(), validator::ValidationError> {
    if dim == 0 {
        return Err(validator::ValidationError::new("embedding_dim must be > 0"));
    }
    Ok(())
}

fn validate_fusion_weights(w: &FusionWeights) -> Result<(), validator::ValidationError> {
    if w.vector < 0.0 || w.lexical < 0.0 || w.graph < 0.0 {
        return Err(validator::ValidationError::new(
            "fusion weights must be non-negative",
        ));
    }
    if w.vector + w.lexical + w.graph <= 0.0 {
        return Err(validator::ValidationError::new(
            "at least one fusion weight must be positive",
        ));
    }
    Ok(())
}

/// Relative weights for combining the three retrieval signals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Embedding cosine similarity signal.
    pub vector: f32,
    /// BM25 lexical signal.
    pub lexical: f32,
    /// Graph-traversal proximity signal.
    pub graph: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: 0.5,
            lexical: 0.3,
            graph: 0.2,
        }
    }
}

/// Central configuration loaded from environment variables.
///
/// Similarity thresholds and fusion weights are tunables, not invariants;
/// they are exposed here rather than hard-coded in the algorithms.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MemoryConfig {
    /// Base URL of the OpenAI-compatible API gateway.
    #[validate(length(min = 1))]
    pub api_base: String,

    /// API key for the gateway.
    pub api_key: String,

    /// Model used for entity/relation extraction.
    pub llm_model: String,

    /// Model used for text embeddings.
    pub embedding_model: String,

    /// Model used for cross-encoder reranking.
    pub reranker_model: String,

    /// Embedding vector dimension (must be > 0). Vectors from different
    /// dimensions are incomparable, so this must stay fixed per deployment.
    #[validate(custom(function = "validate_embedding_dim"))]
    pub embedding_dim: usize,

    /// Minimum cosine similarity for a candidate entity to merge into an
    /// existing entity.
    pub entity_match_threshold: f32,

    /// Minimum cosine similarity for two facts on the same endpoint pair to
    /// be considered contradictory (the newer supersedes the older).
    pub edge_match_threshold: f32,

    /// Cosine similarity above which two facts are treated as identical
    /// (episode reference appended, no new edge).
    pub edge_duplicate_threshold: f32,

    /// Per-signal weights for score fusion during recall.
    #[validate(custom(function = "validate_fusion_weights"))]
    pub fusion_weights: FusionWeights,

    /// Candidates fetched per retrieval signal before fusion.
    pub signal_top_k: usize,

    /// Maximum hop depth for the graph-traversal signal.
    pub traversal_depth: usize,

    /// Score decay applied per hop during traversal.
    pub traversal_hop_decay: f32,

    /// How many fused candidates are passed to the cross-encoder.
    pub rerank_top_n: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            llm_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            reranker_model: "gpt-4o-mini".to_string(),
            embedding_dim: 1536,
            entity_match_threshold: 0.85,
            edge_match_threshold: 0.80,
            edge_duplicate_threshold: 0.95,
            fusion_weights: FusionWeights::default(),
            signal_top_k: 20,
            traversal_depth: 2,
            traversal_hop_decay: 0.7,
            rerank_top_n: 30,
        }
    }
}

impl MemoryConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` first (non-fatal if `.env` is absent),
    /// then reads each variable from the process environment. `LLM_API_KEY`
    /// is required; everything else falls back to [`MemoryConfig::default`].
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let api_key = std::env::var("LLM_API_KEY").map_err(|_| {
            crate::MemoryError::Validation("LLM_API_KEY is required".to_string())
        })?;

        let api_base = std::env::var("LLM_API_BASE").unwrap_or(defaults.api_base);
        let llm_model = std::env::var("LLM_MODEL").unwrap_or(defaults.llm_model);
        let embedding_model =
            std::env::var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model);
        let reranker_model =
            std::env::var("RERANKER_MODEL").unwrap_or(defaults.reranker_model);

        let embedding_dim = match std::env::var("EMBEDDING_DIM") {
            Ok(val) => val.parse::<usize>().map_err(|_| {
                crate::MemoryError::Validation(
                    "EMBEDDING_DIM must be a positive integer".to_string(),
                )
            })?,
            Err(_) => defaults.embedding_dim,
        };

        let entity_match_threshold =
            parse_f32_env("ENTITY_MATCH_THRESHOLD", defaults.entity_match_threshold)?;
        let edge_match_threshold =
            parse_f32_env("EDGE_MATCH_THRESHOLD", defaults.edge_match_threshold)?;
        let edge_duplicate_threshold =
            parse_f32_env("EDGE_DUPLICATE_THRESHOLD", defaults.edge_duplicate_threshold)?;

        let config = Self {
            api_base,
            api_key,
            llm_model,
            embedding_model,
            reranker_model,
            embedding_dim,
            entity_match_threshold,
            edge_match_threshold,
            edge_duplicate_threshold,
            ..defaults
        };

        config
            .validate()
            .map_err(|e| crate::MemoryError::Validation(e.to_string()))?;

        Ok(config)
    }
}

fn parse_f32_env(name: &str, default: f32) -> crate::Result<f32> {
    match std::env::var(name) {
        Ok(val) => val.parse::<f32>().map_err(|_| {
            crate::MemoryError::Validation(format!("{name} must be a float"))
        }),
        Err(_) => Ok(default),
    }
}
