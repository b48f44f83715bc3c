//! Shared deterministic fakes for the integration suites.
//!
//! The LLM is scripted per content marker, the embedder maps a fixed
//! vocabulary onto hand-picked vectors, and the reranker scores lexical
//! token overlap. Everything is pure, so test outcomes are reproducible.

use engram_rs::embedder::{EmbedderClient, Embedding};
use engram_rs::errors::{LlmError, MemoryError, Result};
use engram_rs::llm_client::{LlmClient, Message};
use engram_rs::pipeline::MemoryEngine;
use engram_rs::reranker::RerankerClient;
use engram_rs::scope::ScopeKey;
use engram_rs::store::memory::InMemoryStore;
use engram_rs::types::MemoryConfig;
use serde::de::DeserializeOwned;
use serde_json::json;

pub type TestEngine = MemoryEngine<InMemoryStore, ScriptedLlm, VocabEmbedder, OverlapReranker>;

pub fn engine() -> TestEngine {
    MemoryEngine::new(
        InMemoryStore::new(),
        ScriptedLlm,
        VocabEmbedder,
        OverlapReranker,
        MemoryConfig::default(),
    )
}

pub fn user_scope(user: &str) -> ScopeKey {
    ScopeKey::resolve(user, None, None).unwrap()
}

pub fn agent_scope(user: &str, agent: &str) -> ScopeKey {
    ScopeKey::resolve(user, Some(agent), None).unwrap()
}

/// LLM fake scripted on markers in the episode content.
pub struct ScriptedLlm;

impl ScriptedLlm {
    fn extraction_for(content: &str) -> serde_json::Value {
        if content.contains("joined") {
            json!({
                "entities": [
                    {"name": "Alice", "entity_type": "Person"},
                    {"name": "Acme", "entity_type": "Organization"},
                ],
                "relations": [
                    {"source": "Alice", "target": "Acme",
                     "fact": "Alice works at Acme", "valid_at": "2020"},
                ]
            })
        } else if content.contains("left") {
            json!({
                "entities": [
                    {"name": "Alice", "entity_type": "Person"},
                    {"name": "Acme", "entity_type": "Organization"},
                ],
                "relations": [
                    {"source": "Alice", "target": "Acme",
                     "fact": "Alice left Acme", "valid_at": "2023"},
                ]
            })
        } else if content.contains("failure") {
            json!({
                "entities": [
                    {"name": "Deploy failed", "entity_type": "Failure"},
                    {"name": "Staging", "entity_type": "Entity"},
                ],
                "relations": [
                    {"source": "Deploy failed", "target": "Staging",
                     "fact": "Deploy failed on staging"},
                ]
            })
        } else if content.contains("coffee") {
            json!({
                "entities": [
                    {"name": "Coffee preference", "entity_type": "Fact"},
                ],
                "relations": []
            })
        } else {
            json!({"entities": [], "relations": []})
        }
    }
}

impl LlmClient for ScriptedLlm {
    async fn generate(&self, _messages: &[Message]) -> Result<String> {
        Err(MemoryError::Llm(LlmError::EmptyResponse))
    }

    async fn generate_structured<T>(&self, messages: &[Message]) -> Result<T>
    where
        T: DeserializeOwned + schemars::JsonSchema,
    {
        let content = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        serde_json::from_value(Self::extraction_for(content)).map_err(MemoryError::Serialization)
    }
}

/// Embedder fake with a hand-picked vocabulary.
///
/// "Alice works at Acme" and "Alice left Acme" sit at cosine 0.9; similar
/// enough to contradict each other without counting as duplicates under the
/// default thresholds. Unknown text falls back to a byte-derived vector.
pub struct VocabEmbedder;

fn vocab_vector(text: &str) -> Embedding {
    match text {
        "Alice works at Acme" | "where does Alice work" => {
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        }
        "Alice left Acme" => vec![0.9, 0.436, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        "Alice" => vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        "Acme" => vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        "Deploy failed" | "deploy problems" => {
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
        }
        "Staging" => vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        "Deploy failed on staging" => {
            vec![0.0, 0.0, 0.0, 0.0, 0.7, 0.7, 0.0, 0.0]
        }
        "Coffee preference" => vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        _ => {
            let mut v = vec![0.0_f32; 8];
            for (i, b) in text.bytes().enumerate() {
                v[i % 8] += f32::from(b) / 255.0;
            }
            v
        }
    }
}

impl EmbedderClient for VocabEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(vocab_vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| vocab_vector(t)).collect())
    }

    fn dim(&self) -> usize {
        8
    }
}

/// Reranker fake scoring lowercase token overlap with the query.
pub struct OverlapReranker;

impl RerankerClient for OverlapReranker {
    async fn rank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let query = query.to_lowercase();
        let query_tokens: Vec<&str> = query.split_whitespace().collect();
        Ok(passages
            .iter()
            .map(|p| {
                let passage = p.to_lowercase();
                let hits = query_tokens
                    .iter()
                    .filter(|t| passage.contains(**t))
                    .count();
                hits as f32 / query_tokens.len().max(1) as f32
            })
            .collect())
    }
}
