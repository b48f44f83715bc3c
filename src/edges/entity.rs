//! EntityEdge: bi-temporal factual relationship between EntityNodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A factual relationship between two entity nodes, with bi-temporal metadata.
///
/// - **Valid time** (`valid_at` / `invalid_at`): when the fact was true in the
///   real world. `invalid_at` is set when a later contradicting fact
///   supersedes this one; the edge then becomes historical but is retained
///   for provenance.
/// - **Transaction time** (`created_at`): when the edge was recorded, which
///   is independent of when the fact became true.
///
/// Invariant: `invalid_at` is `None` or strictly after `valid_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub uuid: Uuid,
    /// UUID of the source EntityNode.
    pub source_node_uuid: Uuid,
    /// UUID of the target EntityNode.
    pub target_node_uuid: Uuid,
    /// Human-readable fact statement.
    pub fact: String,
    pub fact_embedding: Option<Vec<f32>>,
    /// Scope partition key; matches both endpoints.
    pub scope: String,
    /// Importance score inherited from the endpoint entities.
    pub salience: u8,
    /// When the fact became true in the real world.
    pub valid_at: DateTime<Utc>,
    /// When the fact ceased to be true; `None` while the fact is current.
    pub invalid_at: Option<DateTime<Utc>>,
    /// When this edge was recorded in the graph.
    pub created_at: DateTime<Utc>,
    /// Episodes that produced or reinforced this edge (non-owning).
    pub episode_refs: Vec<Uuid>,
}

impl EntityEdge {
    /// Whether this edge represents current (non-superseded) knowledge.
    pub fn is_current(&self) -> bool {
        self.invalid_at.is_none()
    }

    /// Mark this edge as superseded at `at`.
    ///
    /// Returns `false` without mutating when `at <= valid_at`, which would
    /// break the bi-temporal invariant; the caller decides how to handle
    /// that case (the dedup engine treats it as a history backfill instead).
    pub fn invalidate(&mut self, at: DateTime<Utc>) -> bool {
        if at <= self.valid_at {
            return false;
        }
        self.invalid_at = Some(at);
        true
    }

    /// Record that `episode` produced or reinforced this edge.
    /// Idempotent: a repeated uuid is not appended twice.
    pub fn add_episode_ref(&mut self, episode: Uuid) {
        if !self.episode_refs.contains(&episode) {
            self.episode_refs.push(episode);
        }
    }
}
