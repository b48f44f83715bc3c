//! CommunityNode: a cluster summary over related entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A community cluster of related entities, surfaced alongside recall results
/// as higher-level context. Detection is performed out-of-band; this crate
/// stores and retrieves communities but does not compute them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityNode {
    pub uuid: Uuid,
    pub name: String,
    pub scope: String,
    pub summary: String,
    pub name_embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}
