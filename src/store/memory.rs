//! In-process reference implementation of [`GraphStore`].
//!
//! Keeps the whole graph in partition-indexed maps behind a single
//! `parking_lot::RwLock`, which makes the per-episode commit trivially
//! atomic: the write lock is held for the duration of the delta. Lexical
//! search builds a BM25 engine over the partition's documents per query,
//! which is fine at in-process scale; vector search is a scan with cosine
//! top-k selection.

use std::collections::{HashMap, HashSet};

use bm25::{Document, Language, SearchEngineBuilder};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::edges::{EntityEdge, EpisodicEdge};
use crate::errors::Result;
use crate::nodes::{CommunityNode, EntityNode, EpisodeNode};
use crate::utils::top_k_by_cosine;

use super::{DeletedCounts, FulltextHits, GraphDelta, GraphStore, TraversalHits};

/// Per-partition uuid indexes, in insertion order for deterministic scans.
#[derive(Debug, Default)]
struct PartitionIndex {
    entities: Vec<Uuid>,
    edges: Vec<Uuid>,
    episodes: Vec<Uuid>,
    communities: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct Inner {
    entities: HashMap<Uuid, EntityNode>,
    edges: HashMap<Uuid, EntityEdge>,
    episodes: HashMap<Uuid, EpisodeNode>,
    communities: HashMap<Uuid, CommunityNode>,
    mentions: Vec<EpisodicEdge>,
    partitions: HashMap<String, PartitionIndex>,
    /// entity uuid → edge uuids touching it.
    adjacency: HashMap<Uuid, Vec<Uuid>>,
}

impl Inner {
    fn partition_mut(&mut self, partition: &str) -> &mut PartitionIndex {
        self.partitions.entry(partition.to_string()).or_default()
    }

    fn apply(&mut self, delta: GraphDelta) {
        if let Some(episode) = delta.episode {
            self.partition_mut(&episode.scope).episodes.push(episode.uuid);
            self.episodes.insert(episode.uuid, episode);
        }
        for entity in delta.new_entities {
            self.partition_mut(&entity.scope).entities.push(entity.uuid);
            self.entities.insert(entity.uuid, entity);
        }
        for entity in delta.updated_entities {
            self.entities.insert(entity.uuid, entity);
        }
        for edge in delta.new_edges {
            self.partition_mut(&edge.scope).edges.push(edge.uuid);
            self.adjacency
                .entry(edge.source_node_uuid)
                .or_default()
                .push(edge.uuid);
            self.adjacency
                .entry(edge.target_node_uuid)
                .or_default()
                .push(edge.uuid);
            self.edges.insert(edge.uuid, edge);
        }
        for edge in delta.updated_edges {
            self.edges.insert(edge.uuid, edge);
        }
        self.mentions.extend(delta.mentions);
    }
}

/// In-memory [`GraphStore`] backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities across all partitions (test/diagnostic aid).
    pub fn entity_count(&self) -> usize {
        self.inner.read().entities.len()
    }

    /// Number of stored edges across all partitions (test/diagnostic aid).
    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }
}

/// BM25-score `docs` against `query`, returning up to `k` `(score, uuid)`
/// hits in descending score order. Zero-score hits are dropped.
fn bm25_rank(docs: Vec<(Uuid, String)>, query: &str, k: usize) -> Vec<(f32, Uuid)> {
    if docs.is_empty() || query.trim().is_empty() {
        return Vec::new();
    }

    let uuids: Vec<Uuid> = docs.iter().map(|(id, _)| *id).collect();
    let documents: Vec<Document<u32>> = docs
        .into_iter()
        .enumerate()
        .map(|(i, (_, text))| Document::new(i as u32, text))
        .collect();

    let engine = SearchEngineBuilder::<u32>::with_documents(Language::English, documents).build();

    engine
        .search(query, k)
        .into_iter()
        .filter(|hit| hit.score > 0.0)
        .map(|hit| (hit.score, uuids[hit.document.id as usize]))
        .collect()
}

impl GraphStore for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self, delta: GraphDelta) -> Result<()> {
        self.inner.write().apply(delta);
        Ok(())
    }

    async fn delete_partition(&self, partition: &str) -> Result<DeletedCounts> {
        let mut inner = self.inner.write();
        let Some(index) = inner.partitions.remove(partition) else {
            return Ok(DeletedCounts::default());
        };

        let counts = DeletedCounts {
            episodes: index.episodes.len(),
            entities: index.entities.len(),
            edges: index.edges.len(),
        };

        for uuid in &index.episodes {
            inner.episodes.remove(uuid);
        }
        for uuid in &index.entities {
            inner.entities.remove(uuid);
            inner.adjacency.remove(uuid);
        }
        for uuid in &index.edges {
            inner.edges.remove(uuid);
        }
        for uuid in &index.communities {
            inner.communities.remove(uuid);
        }
        inner.mentions.retain(|m| m.scope != partition);

        Ok(counts)
    }

    async fn insert_community(&self, community: CommunityNode) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .partition_mut(&community.scope)
            .communities
            .push(community.uuid);
        inner.communities.insert(community.uuid, community);
        Ok(())
    }

    async fn entity_by_name(
        &self,
        partition: &str,
        name: &str,
        label: &str,
    ) -> Result<Option<EntityNode>> {
        let inner = self.inner.read();
        let Some(index) = inner.partitions.get(partition) else {
            return Ok(None);
        };
        let needle = name.to_lowercase();
        Ok(index
            .entities
            .iter()
            .filter_map(|uuid| inner.entities.get(uuid))
            .find(|e| e.label == label && e.name.to_lowercase() == needle)
            .cloned())
    }

    async fn similar_entities(
        &self,
        partition: &str,
        embedding: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<(f32, EntityNode)>> {
        let inner = self.inner.read();
        let Some(index) = inner.partitions.get(partition) else {
            return Ok(Vec::new());
        };
        let candidates: Vec<(Vec<f32>, EntityNode)> = index
            .entities
            .iter()
            .filter_map(|uuid| inner.entities.get(uuid))
            .filter_map(|e| {
                e.name_embedding
                    .as_ref()
                    .map(|emb| (emb.clone(), e.clone()))
            })
            .collect();
        Ok(top_k_by_cosine(embedding, &candidates, k, min_score))
    }

    async fn edges_between(
        &self,
        partition: &str,
        source: Uuid,
        target: Uuid,
    ) -> Result<Vec<EntityEdge>> {
        let inner = self.inner.read();
        let Some(index) = inner.partitions.get(partition) else {
            return Ok(Vec::new());
        };
        Ok(index
            .edges
            .iter()
            .filter_map(|uuid| inner.edges.get(uuid))
            .filter(|e| e.source_node_uuid == source && e.target_node_uuid == target)
            .cloned()
            .collect())
    }

    async fn similar_edges(
        &self,
        partitions: &[String],
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(f32, EntityEdge)>> {
        let inner = self.inner.read();
        let candidates: Vec<(Vec<f32>, EntityEdge)> = partitions
            .iter()
            .filter_map(|p| inner.partitions.get(p))
            .flat_map(|index| index.edges.iter())
            .filter_map(|uuid| inner.edges.get(uuid))
            .filter_map(|e| {
                e.fact_embedding
                    .as_ref()
                    .map(|emb| (emb.clone(), e.clone()))
            })
            .collect();
        Ok(top_k_by_cosine(embedding, &candidates, k, f32::MIN))
    }

    async fn similar_nodes(
        &self,
        partitions: &[String],
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(f32, EntityNode)>> {
        let inner = self.inner.read();
        let candidates: Vec<(Vec<f32>, EntityNode)> = partitions
            .iter()
            .filter_map(|p| inner.partitions.get(p))
            .flat_map(|index| index.entities.iter())
            .filter_map(|uuid| inner.entities.get(uuid))
            .filter_map(|e| {
                e.name_embedding
                    .as_ref()
                    .map(|emb| (emb.clone(), e.clone()))
            })
            .collect();
        Ok(top_k_by_cosine(embedding, &candidates, k, f32::MIN))
    }

    async fn fulltext_search(
        &self,
        partitions: &[String],
        query: &str,
        k: usize,
    ) -> Result<FulltextHits> {
        let inner = self.inner.read();
        let indexes: Vec<&PartitionIndex> = partitions
            .iter()
            .filter_map(|p| inner.partitions.get(p))
            .collect();

        let edge_docs: Vec<(Uuid, String)> = indexes
            .iter()
            .flat_map(|i| i.edges.iter())
            .filter_map(|uuid| inner.edges.get(uuid))
            .map(|e| (e.uuid, e.fact.clone()))
            .collect();
        let node_docs: Vec<(Uuid, String)> = indexes
            .iter()
            .flat_map(|i| i.entities.iter())
            .filter_map(|uuid| inner.entities.get(uuid))
            .map(|e| (e.uuid, format!("{} {}", e.name, e.label)))
            .collect();
        let episode_docs: Vec<(Uuid, String)> = indexes
            .iter()
            .flat_map(|i| i.episodes.iter())
            .filter_map(|uuid| inner.episodes.get(uuid))
            .map(|e| (e.uuid, e.content.clone()))
            .collect();
        let community_docs: Vec<(Uuid, String)> = indexes
            .iter()
            .flat_map(|i| i.communities.iter())
            .filter_map(|uuid| inner.communities.get(uuid))
            .map(|c| (c.uuid, format!("{} {}", c.name, c.summary)))
            .collect();

        Ok(FulltextHits {
            edges: bm25_rank(edge_docs, query, k)
                .into_iter()
                .filter_map(|(s, id)| inner.edges.get(&id).map(|e| (s, e.clone())))
                .collect(),
            nodes: bm25_rank(node_docs, query, k)
                .into_iter()
                .filter_map(|(s, id)| inner.entities.get(&id).map(|e| (s, e.clone())))
                .collect(),
            episodes: bm25_rank(episode_docs, query, k)
                .into_iter()
                .filter_map(|(s, id)| inner.episodes.get(&id).map(|e| (s, e.clone())))
                .collect(),
            communities: bm25_rank(community_docs, query, k)
                .into_iter()
                .filter_map(|(s, id)| inner.communities.get(&id).map(|c| (s, c.clone())))
                .collect(),
        })
    }

    async fn neighborhood(
        &self,
        partitions: &[String],
        seeds: &[Uuid],
        depth: usize,
    ) -> Result<TraversalHits> {
        let inner = self.inner.read();
        let visible: HashSet<&str> = partitions.iter().map(String::as_str).collect();

        let mut visited_entities: HashSet<Uuid> = HashSet::new();
        let mut visited_edges: HashSet<Uuid> = HashSet::new();
        let mut hits = TraversalHits::default();
        let mut frontier: Vec<Uuid> = Vec::new();

        for seed in seeds {
            if let Some(entity) = inner.entities.get(seed) {
                if visible.contains(entity.scope.as_str()) && visited_entities.insert(*seed) {
                    hits.nodes.push((0, entity.clone()));
                    frontier.push(*seed);
                }
            }
        }

        for hop in 0..depth {
            let mut next_frontier: Vec<Uuid> = Vec::new();

            for entity_uuid in &frontier {
                let Some(edge_uuids) = inner.adjacency.get(entity_uuid) else {
                    continue;
                };
                for edge_uuid in edge_uuids {
                    if visited_edges.contains(edge_uuid) {
                        continue;
                    }
                    let Some(edge) = inner.edges.get(edge_uuid) else {
                        continue;
                    };
                    if !visible.contains(edge.scope.as_str()) {
                        continue;
                    }
                    // Traversal follows current knowledge only.
                    if !edge.is_current() {
                        continue;
                    }
                    visited_edges.insert(*edge_uuid);
                    hits.edges.push((hop + 1, edge.clone()));

                    let neighbor = if edge.source_node_uuid == *entity_uuid {
                        edge.target_node_uuid
                    } else {
                        edge.source_node_uuid
                    };
                    if visited_entities.insert(neighbor) {
                        if let Some(entity) = inner.entities.get(&neighbor) {
                            if visible.contains(entity.scope.as_str()) {
                                hits.nodes.push((hop + 1, entity.clone()));
                                next_frontier.push(neighbor);
                            }
                        }
                    }
                }
            }

            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(hits)
    }

    async fn get_episodes(&self, uuids: &[Uuid]) -> Result<Vec<EpisodeNode>> {
        let inner = self.inner.read();
        Ok(uuids
            .iter()
            .filter_map(|uuid| inner.episodes.get(uuid))
            .cloned()
            .collect())
    }

    async fn list_episodes(
        &self,
        partition: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EpisodeNode>> {
        let inner = self.inner.read();
        let Some(index) = inner.partitions.get(partition) else {
            return Ok(Vec::new());
        };
        let mut episodes: Vec<EpisodeNode> = index
            .episodes
            .iter()
            .filter_map(|uuid| inner.episodes.get(uuid))
            .cloned()
            .collect();
        // Newest first; name as a stable tiebreak.
        episodes.sort_by(|a, b| {
            b.reference_time
                .cmp(&a.reference_time)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(episodes.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    fn entity(name: &str, scope: &str, embedding: Option<Vec<f32>>) -> EntityNode {
        EntityNode {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            label: "Entity".to_string(),
            scope: scope.to_string(),
            attributes: Map::new(),
            salience: 5,
            name_embedding: embedding,
            episode_refs: vec![],
            created_at: Utc::now(),
        }
    }

    fn edge(source: &EntityNode, target: &EntityNode, fact: &str) -> EntityEdge {
        EntityEdge {
            uuid: Uuid::new_v4(),
            source_node_uuid: source.uuid,
            target_node_uuid: target.uuid,
            fact: fact.to_string(),
            fact_embedding: Some(vec![1.0, 0.0]),
            scope: source.scope.clone(),
            salience: 5,
            valid_at: Utc::now(),
            invalid_at: None,
            created_at: Utc::now(),
            episode_refs: vec![],
        }
    }

    fn episode(scope: &str, content: &str, minute: u32) -> EpisodeNode {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
        EpisodeNode {
            uuid: Uuid::new_v4(),
            name: EpisodeNode::derive_name(scope, &t),
            scope: scope.to_string(),
            session: None,
            source: crate::nodes::EpisodeSource::Text,
            content: content.to_string(),
            reference_time: t,
            created_at: t,
        }
    }

    #[tokio::test]
    async fn commit_and_exact_lookup() {
        let store = InMemoryStore::new();
        let e = entity("Alice", "u1", None);
        store
            .commit(GraphDelta {
                new_entities: vec![e.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        let found = store.entity_by_name("u1", "alice", "Entity").await.unwrap();
        assert_eq!(found.unwrap().uuid, e.uuid);

        // Other partitions see nothing.
        assert!(store
            .entity_by_name("u2", "alice", "Entity")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn similar_entities_respects_threshold_and_partition() {
        let store = InMemoryStore::new();
        let close = entity("close", "u1", Some(vec![1.0, 0.0]));
        let far = entity("far", "u1", Some(vec![0.0, 1.0]));
        let other_scope = entity("other", "u2", Some(vec![1.0, 0.0]));
        store
            .commit(GraphDelta {
                new_entities: vec![close.clone(), far, other_scope],
                ..Default::default()
            })
            .await
            .unwrap();

        let hits = store
            .similar_entities("u1", &[1.0, 0.0], 10, 0.9)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1.uuid, close.uuid);
    }

    #[tokio::test]
    async fn fulltext_matches_edge_facts() {
        let store = InMemoryStore::new();
        let a = entity("Alice", "u1", None);
        let b = entity("Acme", "u1", None);
        let ab = edge(&a, &b, "Alice works at Acme as an engineer");
        store
            .commit(GraphDelta {
                new_entities: vec![a, b],
                new_edges: vec![ab.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        let hits = store
            .fulltext_search(&["u1".to_string()], "engineer", 10)
            .await
            .unwrap();
        assert_eq!(hits.edges.len(), 1);
        assert_eq!(hits.edges[0].1.uuid, ab.uuid);
    }

    #[tokio::test]
    async fn neighborhood_walks_hops_and_skips_invalidated() {
        let store = InMemoryStore::new();
        let a = entity("a", "u1", None);
        let b = entity("b", "u1", None);
        let c = entity("c", "u1", None);
        let ab = edge(&a, &b, "a knows b");
        let mut bc = edge(&b, &c, "b knows c");
        let mut bc_old = edge(&b, &c, "b used to know c");
        bc_old.valid_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        bc_old.invalid_at = Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        bc.valid_at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();

        store
            .commit(GraphDelta {
                new_entities: vec![a.clone(), b.clone(), c.clone()],
                new_edges: vec![ab, bc, bc_old.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        let hits = store
            .neighborhood(&["u1".to_string()], &[a.uuid], 2)
            .await
            .unwrap();

        // a at hop 0, b at hop 1, c at hop 2.
        let hops: HashMap<Uuid, usize> =
            hits.nodes.iter().map(|(h, n)| (n.uuid, *h)).collect();
        assert_eq!(hops[&a.uuid], 0);
        assert_eq!(hops[&b.uuid], 1);
        assert_eq!(hops[&c.uuid], 2);

        // The invalidated edge is not traversed.
        assert!(hits.edges.iter().all(|(_, e)| e.uuid != bc_old.uuid));
    }

    #[tokio::test]
    async fn delete_partition_removes_everything_and_counts() {
        let store = InMemoryStore::new();
        let a = entity("a", "u1", None);
        let b = entity("b", "u1", None);
        let keep = entity("keep", "u2", None);
        let ab = edge(&a, &b, "a knows b");
        store
            .commit(GraphDelta {
                episode: Some(episode("u1", "content", 0)),
                new_entities: vec![a, b, keep.clone()],
                new_edges: vec![ab],
                ..Default::default()
            })
            .await
            .unwrap();

        let counts = store.delete_partition("u1").await.unwrap();
        assert_eq!(
            counts,
            DeletedCounts {
                episodes: 1,
                entities: 2,
                edges: 1
            }
        );

        assert_eq!(store.entity_count(), 1);
        assert!(store
            .entity_by_name("u2", "keep", "Entity")
            .await
            .unwrap()
            .is_some());

        // Deleting an absent partition is a no-op.
        assert_eq!(
            store.delete_partition("u1").await.unwrap(),
            DeletedCounts::default()
        );
    }

    #[tokio::test]
    async fn list_episodes_paginates_newest_first() {
        let store = InMemoryStore::new();
        for minute in 0..5 {
            store
                .commit(GraphDelta {
                    episode: Some(episode("u1", &format!("episode {minute}"), minute)),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let page = store.list_episodes("u1", 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "episode 4");
        assert_eq!(page[1].content, "episode 3");

        let page = store.list_episodes("u1", 2, 4).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "episode 0");
    }
}
