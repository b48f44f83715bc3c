//! Graph store abstraction.
//!
//! Defines the [`GraphStore`] trait the engine runs against: transactional
//! per-episode commits, partition-scoped reads, vector similarity, fulltext
//! search, and bounded BFS traversal; all assumed available from a single
//! backing store. Persistent backends live outside this crate;
//! [`memory::InMemoryStore`] is the in-process reference implementation used
//! by the test suite and by deployments that don't need durability.

pub mod memory;

use uuid::Uuid;

use crate::edges::{EntityEdge, EpisodicEdge};
use crate::errors::Result;
use crate::nodes::{CommunityNode, EntityNode, EpisodeNode};

/// The full write set for one ingested episode.
///
/// A delta commits atomically: either the episode, its mention edges, and
/// every entity/edge creation, merge, and invalidation land together, or
/// nothing does. `updated_*` records replace the stored versions wholesale
/// (merged attributes, appended episode refs, set `invalid_at`).
#[derive(Debug, Clone, Default)]
pub struct GraphDelta {
    pub episode: Option<EpisodeNode>,
    pub new_entities: Vec<EntityNode>,
    pub updated_entities: Vec<EntityNode>,
    pub new_edges: Vec<EntityEdge>,
    pub updated_edges: Vec<EntityEdge>,
    pub mentions: Vec<EpisodicEdge>,
}

/// What a partition-wide delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletedCounts {
    pub episodes: usize,
    pub entities: usize,
    pub edges: usize,
}

/// Scored hits from the lexical (BM25) signal, per result kind.
#[derive(Debug, Clone, Default)]
pub struct FulltextHits {
    pub edges: Vec<(f32, EntityEdge)>,
    pub nodes: Vec<(f32, EntityNode)>,
    pub episodes: Vec<(f32, EpisodeNode)>,
    pub communities: Vec<(f32, CommunityNode)>,
}

/// Nodes and edges reached by bounded BFS, tagged with hop distance from the
/// nearest seed.
#[derive(Debug, Clone, Default)]
pub struct TraversalHits {
    pub nodes: Vec<(usize, EntityNode)>,
    pub edges: Vec<(usize, EntityEdge)>,
}

/// Trait representing a graph storage backend.
#[allow(async_fn_in_trait)]
pub trait GraphStore: Send + Sync {
    /// Health check; verify the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Release any held resources / connections.
    async fn close(&self) -> Result<()>;

    // ── Writes ──────────────────────────────────────────────────────────────

    /// Apply one episode's delta atomically (all-or-nothing).
    async fn commit(&self, delta: GraphDelta) -> Result<()>;

    /// Remove every episode, entity, edge, and community in `partition`.
    async fn delete_partition(&self, partition: &str) -> Result<DeletedCounts>;

    /// Store a community summary node.
    async fn insert_community(&self, community: CommunityNode) -> Result<()>;

    // ── Dedup reads (single write partition) ───────────────────────────────

    /// Exact `(name, label)` lookup, case-insensitive on name.
    async fn entity_by_name(
        &self,
        partition: &str,
        name: &str,
        label: &str,
    ) -> Result<Option<EntityNode>>;

    /// Top-k entities by embedding cosine similarity, at or above `min_score`.
    async fn similar_entities(
        &self,
        partition: &str,
        embedding: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<(f32, EntityNode)>>;

    /// All edges (current and historical) between an endpoint pair.
    async fn edges_between(
        &self,
        partition: &str,
        source: Uuid,
        target: Uuid,
    ) -> Result<Vec<EntityEdge>>;

    // ── Retrieval signals (read-side partition union) ──────────────────────

    /// Top-k edges by fact-embedding cosine similarity.
    async fn similar_edges(
        &self,
        partitions: &[String],
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(f32, EntityEdge)>>;

    /// Top-k entity nodes by name-embedding cosine similarity.
    async fn similar_nodes(
        &self,
        partitions: &[String],
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(f32, EntityNode)>>;

    /// BM25 lexical search over facts, names, summaries, and episode content.
    async fn fulltext_search(
        &self,
        partitions: &[String],
        query: &str,
        k: usize,
    ) -> Result<FulltextHits>;

    /// Bounded-depth BFS from `seeds`, following current (non-invalidated)
    /// edges only.
    async fn neighborhood(
        &self,
        partitions: &[String],
        seeds: &[Uuid],
        depth: usize,
    ) -> Result<TraversalHits>;

    // ── Lookups / listing ──────────────────────────────────────────────────

    /// Fetch episodes by uuid; unknown uuids are silently skipped.
    async fn get_episodes(&self, uuids: &[Uuid]) -> Result<Vec<EpisodeNode>>;

    /// Page through a partition's episodes, newest first.
    async fn list_episodes(
        &self,
        partition: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EpisodeNode>>;
}
