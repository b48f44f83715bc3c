//! Extraction Adapter: turns raw episode content into candidate graph deltas.
//!
//! Text understanding is delegated to the LLM capability; this module's job
//! is to validate and normalize its output: reject empty content, resolve
//! relation endpoints, coerce timestamps, assign default salience per
//! inferred type, and attach provisional embeddings before candidates reach
//! the dedup engine. Read-only with respect to the graph, so the external
//! calls are retry-safe.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::embedder::{EmbedderClient, Embedding};
use crate::errors::{MemoryError, Result};
use crate::llm_client::{LlmClient, Message};
use crate::nodes::{clamp_salience, default_salience};
use crate::prompts;
use crate::utils::{normalize_whitespace, parse_flexible_datetime};

// ── Structured LLM output ─────────────────────────────────────────────────────

/// One entity as extracted by the model, before normalization.
#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractedEntity {
    name: String,
    /// Open-ended type label (Person, Decision, Failure, …).
    entity_type: String,
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
    /// Model-assigned importance override; defaulted per type when absent.
    #[serde(default)]
    salience: Option<u8>,
}

/// One relation as extracted by the model, endpoints by entity name.
#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractedRelation {
    source: String,
    target: String,
    fact: String,
    /// When the fact became true, if the content says (ISO date or year).
    #[serde(default)]
    valid_at: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractionResponse {
    entities: Vec<ExtractedEntity>,
    relations: Vec<ExtractedRelation>,
}

// ── Candidate output ──────────────────────────────────────────────────────────

/// A normalized candidate entity, ready for dedup resolution.
#[derive(Debug, Clone)]
pub struct CandidateEntity {
    pub name: String,
    pub label: String,
    pub attributes: Map<String, Value>,
    pub salience: u8,
    pub embedding: Embedding,
}

/// A normalized candidate edge. Endpoints are indices into the candidate
/// entity list; dedup resolves them to graph uuids.
#[derive(Debug, Clone)]
pub struct CandidateEdge {
    pub source: usize,
    pub target: usize,
    pub fact: String,
    pub embedding: Embedding,
    pub valid_at: DateTime<Utc>,
}

/// Output of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ExtractedCandidates {
    pub entities: Vec<CandidateEntity>,
    pub edges: Vec<CandidateEdge>,
}

// ── Adapter ───────────────────────────────────────────────────────────────────

/// Extraction adapter over the LLM and embedding capabilities.
pub struct ExtractionAdapter<'a, L, E> {
    llm: &'a L,
    embedder: &'a E,
}

impl<'a, L: LlmClient, E: EmbedderClient> ExtractionAdapter<'a, L, E> {
    pub fn new(llm: &'a L, embedder: &'a E) -> Self {
        Self { llm, embedder }
    }

    /// Extract candidate entities and edges from one episode's content.
    ///
    /// Fails with [`MemoryError::EmptyContent`] when there is nothing to
    /// extract. Relations whose endpoints don't match an extracted entity
    /// are dropped with a warning rather than failing the episode.
    pub async fn extract(
        &self,
        content: &str,
        reference_time: DateTime<Utc>,
    ) -> Result<ExtractedCandidates> {
        let content = normalize_whitespace(content);
        if content.is_empty() {
            return Err(MemoryError::EmptyContent);
        }

        let user_prompt = prompts::EXTRACT_USER_TEMPLATE
            .replace("{reference_time}", &reference_time.to_rfc3339())
            .replace("{content}", &content);
        let messages = [
            Message::system(prompts::EXTRACT_SYSTEM),
            Message::user(user_prompt),
        ];

        let response: ExtractionResponse = self
            .llm
            .generate_structured(&messages)
            .await
            .map_err(|e| MemoryError::Extraction(e.to_string()))?;

        let (entities, edges) = self.normalize(response, reference_time);

        self.attach_embeddings(entities, edges).await
    }

    /// Normalize model output: trim names, drop empties, resolve relation
    /// endpoints to entity indices, coerce timestamps, assign salience.
    fn normalize(
        &self,
        response: ExtractionResponse,
        reference_time: DateTime<Utc>,
    ) -> (Vec<CandidateEntity>, Vec<CandidateEdge>) {
        let mut entities: Vec<CandidateEntity> = Vec::with_capacity(response.entities.len());
        for raw in response.entities {
            let name = normalize_whitespace(&raw.name);
            if name.is_empty() {
                warn!("extraction produced an entity with an empty name; dropped");
                continue;
            }
            let label = normalize_whitespace(&raw.entity_type);
            let label = if label.is_empty() {
                "Entity".to_string()
            } else {
                label
            };
            let salience = clamp_salience(raw.salience.unwrap_or_else(|| default_salience(&label)));
            entities.push(CandidateEntity {
                name,
                label,
                attributes: raw.attributes.unwrap_or_default(),
                salience,
                embedding: Vec::new(),
            });
        }

        let mut edges: Vec<CandidateEdge> = Vec::with_capacity(response.relations.len());
        for raw in response.relations {
            let fact = normalize_whitespace(&raw.fact);
            if fact.is_empty() {
                continue;
            }
            let source = find_entity(&entities, &raw.source);
            let target = find_entity(&entities, &raw.target);
            let (Some(source), Some(target)) = (source, target) else {
                warn!(
                    fact = %fact,
                    "relation endpoint does not match any extracted entity; dropped"
                );
                continue;
            };
            let valid_at = raw
                .valid_at
                .as_deref()
                .and_then(parse_flexible_datetime)
                .unwrap_or(reference_time);
            edges.push(CandidateEdge {
                source,
                target,
                fact,
                embedding: Vec::new(),
                valid_at,
            });
        }

        debug!(
            entities = entities.len(),
            edges = edges.len(),
            "normalized extraction output"
        );

        (entities, edges)
    }

    /// Embed all candidate names and facts in one batch call.
    async fn attach_embeddings(
        &self,
        mut entities: Vec<CandidateEntity>,
        mut edges: Vec<CandidateEdge>,
    ) -> Result<ExtractedCandidates> {
        let texts: Vec<&str> = entities
            .iter()
            .map(|e| e.name.as_str())
            .chain(edges.iter().map(|e| e.fact.as_str()))
            .collect();

        if texts.is_empty() {
            return Ok(ExtractedCandidates { entities, edges });
        }

        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| MemoryError::Embedder(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(MemoryError::Embedder(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let mut iter = embeddings.into_iter();
        for entity in &mut entities {
            entity.embedding = iter.next().unwrap_or_default();
        }
        for edge in &mut edges {
            edge.embedding = iter.next().unwrap_or_default();
        }

        Ok(ExtractedCandidates { entities, edges })
    }
}

/// Case-insensitive endpoint lookup by entity name.
fn find_entity(entities: &[CandidateEntity], name: &str) -> Option<usize> {
    let needle = normalize_whitespace(name).to_lowercase();
    entities
        .iter()
        .position(|e| e.name.to_lowercase() == needle)
}
