//! EpisodeNode: an ingested data episode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The source kind of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeSource {
    Message,
    Text,
    Json,
}

impl EpisodeSource {
    /// Parse a source string, defaulting to `Message` for unknown values
    /// (lenient by design; the caller's source tag is advisory).
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => Self::Text,
            "json" => Self::Json,
            _ => Self::Message,
        }
    }
}

/// An ingested episode: one immutable unit of raw content plus provenance
/// metadata.
///
/// Episodes form the append-only provenance log from which entities and edges
/// are derived. They are never mutated or deleted except by a scope-wide
/// delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeNode {
    pub uuid: Uuid,
    /// Deterministic name derived from scope and event time.
    pub name: String,
    pub scope: String,
    /// Optional session/run tag from the caller.
    pub session: Option<String>,
    pub source: EpisodeSource,
    /// Raw episode content, stored verbatim.
    pub content: String,
    /// Caller-supplied event time; defaults to ingestion time.
    pub reference_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EpisodeNode {
    /// Derive the deterministic episode name for a scope and event time.
    pub fn derive_name(partition: &str, reference_time: &DateTime<Utc>) -> String {
        format!(
            "memory_{}_{}",
            partition,
            reference_time.format("%Y%m%d_%H%M%S")
        )
    }
}
