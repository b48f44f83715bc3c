//! # engram-rs
//!
//! A temporal knowledge-graph memory engine for autonomous agents.
//!
//! Raw episodes (messages, documents, JSON payloads) are distilled into a
//! graph of entities and bi-temporal factual edges, partitioned per
//! user/agent scope, and recalled through hybrid retrieval.
//!
//! ## Architecture
//!
//! - **Scope resolution** ([`scope`]): tenant keys and the read-side
//!   agent → user partition union.
//! - **Extraction** ([`extraction`]): LLM-backed entity/relation extraction
//!   with normalization and provisional embeddings.
//! - **Dedup engine** ([`dedup`]): merges candidates into the stored graph
//!   and maintains the bi-temporal edge lifecycle.
//! - **Graph store** ([`store`]): the storage trait plus an in-memory
//!   reference backend.
//! - **Hybrid recall** ([`search`]): vector + BM25 + graph-traversal
//!   fusion with cross-encoder reranking.
//! - **Pipeline** ([`pipeline`]): the [`MemoryEngine`] facade: ingest,
//!   bulk ingest, recall, listing, deletion.
//! - **Capabilities** ([`llm_client`], [`embedder`], [`reranker`]):
//!   model-backed traits with OpenAI-compatible implementations.

pub mod dedup;
pub mod edges;
pub mod embedder;
pub mod errors;
pub mod extraction;
pub mod llm_client;
pub mod nodes;
pub mod pipeline;
pub mod prompts;
pub mod reranker;
pub mod scope;
pub mod search;
pub mod store;
pub mod types;
pub mod utils;

pub use errors::{LlmError, MemoryError, Result};
pub use pipeline::{IngestRequest, IngestResult, MemoryEngine};
pub use scope::ScopeKey;
pub use search::{RecallQuery, RecallResult};
pub use types::{FusionWeights, MemoryConfig};
