//! EpisodicEdge: MENTIONS relationship (EpisodeNode → EntityNode).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A MENTIONS edge from an episode to an entity it produced or reinforced.
/// Written alongside every commit so provenance can be walked in both
/// directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicEdge {
    pub uuid: Uuid,
    /// UUID of the source EpisodeNode.
    pub source_node_uuid: Uuid,
    /// UUID of the target EntityNode.
    pub target_node_uuid: Uuid,
    pub scope: String,
    pub created_at: DateTime<Utc>,
}

impl EpisodicEdge {
    pub fn mentions(episode: Uuid, entity: Uuid, scope: &str) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            source_node_uuid: episode,
            target_node_uuid: entity,
            scope: scope.to_string(),
            created_at: Utc::now(),
        }
    }
}
