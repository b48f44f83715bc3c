//! Dedup engine: resolves extraction candidates against the stored graph.
//!
//! Turns one episode's [`ExtractedCandidates`] into a [`GraphDelta`]:
//! candidate entities are matched to existing nodes (exact name/label first,
//! then embedding similarity) and merged, candidate edges are classified
//! against the edges already recorded between the same endpoints as
//! identical, contradictory, or genuinely new. Contradictions drive the
//! bi-temporal bookkeeping: the fact with the later `valid_at` stays current
//! and the earlier one gets its `invalid_at` set.
//!
//! Within one episode the delta itself acts as the working set, so two
//! candidates in the same batch that resolve to each other merge
//! deterministically in input order.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::edges::{EntityEdge, EpisodicEdge};
use crate::errors::Result;
use crate::extraction::{CandidateEdge, CandidateEntity, ExtractedCandidates};
use crate::nodes::EntityNode;
use crate::store::{GraphDelta, GraphStore};
use crate::types::MemoryConfig;
use crate::utils::cosine_similarity;

/// Resolves candidates for a single write partition.
pub struct DedupResolver<'a, S: GraphStore> {
    store: &'a S,
    config: &'a MemoryConfig,
}

impl<'a, S: GraphStore> DedupResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a MemoryConfig) -> Self {
        Self { store, config }
    }

    /// Resolve one episode's candidates into a commit-ready delta.
    ///
    /// The returned delta carries entity creations/merges, edge
    /// classifications, and one MENTIONS edge per resolved entity. The
    /// episode node itself is attached by the caller.
    pub async fn resolve(
        &self,
        partition: &str,
        episode_uuid: Uuid,
        candidates: ExtractedCandidates,
    ) -> Result<GraphDelta> {
        let mut delta = GraphDelta::default();

        // Candidate index → (resolved uuid, post-merge salience).
        let mut resolved: Vec<(Uuid, u8)> = Vec::with_capacity(candidates.entities.len());
        for candidate in candidates.entities {
            let (uuid, salience) = self
                .resolve_entity(partition, episode_uuid, candidate, &mut delta)
                .await?;
            resolved.push((uuid, salience));
        }

        for entity_uuid in unique_in_order(resolved.iter().map(|(u, _)| *u)) {
            delta
                .mentions
                .push(EpisodicEdge::mentions(episode_uuid, entity_uuid, partition));
        }

        for candidate in candidates.edges {
            let (Some(&(source_uuid, source_salience)), Some(&(target_uuid, target_salience))) =
                (resolved.get(candidate.source), resolved.get(candidate.target))
            else {
                warn!(
                    partition,
                    source = candidate.source,
                    target = candidate.target,
                    "edge candidate references an out-of-range entity; dropped"
                );
                continue;
            };
            let salience = source_salience.max(target_salience);
            self.resolve_edge(
                partition,
                episode_uuid,
                candidate,
                source_uuid,
                target_uuid,
                salience,
                &mut delta,
            )
            .await?;
        }

        debug!(
            partition,
            new_entities = delta.new_entities.len(),
            merged_entities = delta.updated_entities.len(),
            new_edges = delta.new_edges.len(),
            updated_edges = delta.updated_edges.len(),
            "resolved episode candidates"
        );

        Ok(delta)
    }

    // ── Entities ───────────────────────────────────────────────────────────

    async fn resolve_entity(
        &self,
        partition: &str,
        episode_uuid: Uuid,
        candidate: CandidateEntity,
        delta: &mut GraphDelta,
    ) -> Result<(Uuid, u8)> {
        // Exact (name, label) match, batch first so same-episode duplicates
        // collapse without a store round trip.
        let needle = candidate.name.to_lowercase();
        let batch_exact = delta_entities(delta)
            .find(|e| e.label == candidate.label && e.name.to_lowercase() == needle)
            .map(|e| e.uuid);
        if let Some(uuid) = batch_exact {
            return Ok(self.merge_entity(uuid, episode_uuid, &candidate, delta, None));
        }
        if let Some(stored) = self
            .store
            .entity_by_name(partition, &candidate.name, &candidate.label)
            .await?
        {
            let uuid = stored.uuid;
            return Ok(self.merge_entity(uuid, episode_uuid, &candidate, delta, Some(stored)));
        }

        // Fuzzy match by embedding: best hit across the batch working set and
        // the store, at or above the match threshold. Batch wins ties so
        // resolution stays deterministic in input order.
        let threshold = self.config.entity_match_threshold;
        let batch_best = delta_entities(delta)
            .filter_map(|e| {
                let emb = e.name_embedding.as_ref()?;
                let score = cosine_similarity(&candidate.embedding, emb);
                (score >= threshold).then_some((score, e.uuid))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));
        let store_best = self
            .store
            .similar_entities(partition, &candidate.embedding, 1, threshold)
            .await?
            .into_iter()
            .next();

        match (batch_best, store_best) {
            (Some((batch_score, uuid)), Some((store_score, _))) if batch_score >= store_score => {
                Ok(self.merge_entity(uuid, episode_uuid, &candidate, delta, None))
            }
            (Some((_, uuid)), None) => {
                Ok(self.merge_entity(uuid, episode_uuid, &candidate, delta, None))
            }
            (_, Some((_, stored))) => {
                let uuid = stored.uuid;
                Ok(self.merge_entity(uuid, episode_uuid, &candidate, delta, Some(stored)))
            }
            (None, None) => {
                let node = EntityNode {
                    uuid: Uuid::new_v4(),
                    name: candidate.name,
                    label: candidate.label,
                    scope: partition.to_string(),
                    attributes: candidate.attributes,
                    salience: candidate.salience,
                    name_embedding: Some(candidate.embedding),
                    episode_refs: vec![episode_uuid],
                    created_at: Utc::now(),
                };
                let out = (node.uuid, node.salience);
                delta.new_entities.push(node);
                Ok(out)
            }
        }
    }

    /// Merge `candidate` into the entity identified by `uuid`. `stored` is
    /// the node as loaded from the store when it isn't in the delta yet.
    fn merge_entity(
        &self,
        uuid: Uuid,
        episode_uuid: Uuid,
        candidate: &CandidateEntity,
        delta: &mut GraphDelta,
        stored: Option<EntityNode>,
    ) -> (Uuid, u8) {
        if let Some(node) = stored {
            // A store hit may already sit in the delta from an earlier
            // candidate in this batch; don't shadow the merged copy.
            if delta_entities(delta).all(|e| e.uuid != node.uuid) {
                delta.updated_entities.push(node);
            }
        }
        let node = delta_entities_mut(delta)
            .find(|e| e.uuid == uuid)
            .expect("merge target must be present in the delta");

        // Candidate attributes win on conflict only when the candidate is at
        // least as salient as the stored node.
        let candidate_wins = candidate.salience >= node.salience;
        for (key, value) in &candidate.attributes {
            if candidate_wins || !node.attributes.contains_key(key) {
                node.attributes.insert(key.clone(), value.clone());
            }
        }
        node.salience = node.salience.max(candidate.salience);
        node.add_episode_ref(episode_uuid);

        (uuid, node.salience)
    }

    // ── Edges ──────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    async fn resolve_edge(
        &self,
        partition: &str,
        episode_uuid: Uuid,
        candidate: CandidateEdge,
        source_uuid: Uuid,
        target_uuid: Uuid,
        salience: u8,
        delta: &mut GraphDelta,
    ) -> Result<()> {
        let existing = self
            .edges_for_pair(partition, source_uuid, target_uuid, delta)
            .await?;

        // Identical fact: reinforce the existing edge instead of duplicating.
        let fact_norm = candidate.fact.to_lowercase();
        let identical = existing.iter().find(|e| {
            if e.fact.to_lowercase() == fact_norm {
                return true;
            }
            e.fact_embedding.as_ref().is_some_and(|emb| {
                cosine_similarity(&candidate.embedding, emb)
                    >= self.config.edge_duplicate_threshold
            })
        });
        if let Some(edge) = identical {
            let mut edge = edge.clone();
            edge.add_episode_ref(episode_uuid);
            edge.salience = edge.salience.max(salience);
            upsert_edge(delta, edge);
            return Ok(());
        }

        // Contradictions: current edges on the pair whose fact is similar
        // enough to be about the same thing.
        let contradicted: Vec<&EntityEdge> = existing
            .iter()
            .filter(|e| e.is_current())
            .filter(|e| {
                e.fact_embedding.as_ref().is_some_and(|emb| {
                    cosine_similarity(&candidate.embedding, emb)
                        >= self.config.edge_match_threshold
                })
            })
            .collect();

        // A contradiction at the exact same valid time carries no temporal
        // ordering; treat it as a duplicate of that edge.
        if let Some(same_time) = contradicted
            .iter()
            .find(|e| e.valid_at == candidate.valid_at)
        {
            let mut edge = (*same_time).clone();
            edge.add_episode_ref(episode_uuid);
            edge.salience = edge.salience.max(salience);
            upsert_edge(delta, edge);
            return Ok(());
        }

        // The new fact supersedes every contradicted edge it postdates; if a
        // contradicted edge postdates the new fact instead, the new fact is
        // inserted as already-closed history ending where that edge begins.
        let mut invalid_at = None;
        for edge in contradicted {
            if candidate.valid_at > edge.valid_at {
                let mut superseded = edge.clone();
                superseded.invalidate(candidate.valid_at);
                upsert_edge(delta, superseded);
            } else {
                invalid_at = Some(match invalid_at {
                    Some(at) if at < edge.valid_at => at,
                    _ => edge.valid_at,
                });
            }
        }

        delta.new_edges.push(EntityEdge {
            uuid: Uuid::new_v4(),
            source_node_uuid: source_uuid,
            target_node_uuid: target_uuid,
            fact: candidate.fact,
            fact_embedding: Some(candidate.embedding),
            scope: partition.to_string(),
            salience,
            valid_at: candidate.valid_at,
            invalid_at,
            created_at: Utc::now(),
            episode_refs: vec![episode_uuid],
        });

        Ok(())
    }

    /// Every known edge between the endpoint pair, in either direction:
    /// batch edges first (freshest state), then stored edges not already in
    /// the delta.
    async fn edges_for_pair(
        &self,
        partition: &str,
        source: Uuid,
        target: Uuid,
        delta: &GraphDelta,
    ) -> Result<Vec<EntityEdge>> {
        let mut edges: Vec<EntityEdge> = delta
            .new_edges
            .iter()
            .chain(delta.updated_edges.iter())
            .filter(|e| touches_pair(e, source, target))
            .cloned()
            .collect();

        let mut stored = self.store.edges_between(partition, source, target).await?;
        if source != target {
            stored.extend(self.store.edges_between(partition, target, source).await?);
        }
        for edge in stored {
            if !edges.iter().any(|e| e.uuid == edge.uuid) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }
}

fn touches_pair(edge: &EntityEdge, a: Uuid, b: Uuid) -> bool {
    (edge.source_node_uuid == a && edge.target_node_uuid == b)
        || (edge.source_node_uuid == b && edge.target_node_uuid == a)
}

fn delta_entities(delta: &GraphDelta) -> impl Iterator<Item = &EntityNode> {
    delta.new_entities.iter().chain(delta.updated_entities.iter())
}

fn delta_entities_mut(delta: &mut GraphDelta) -> impl Iterator<Item = &mut EntityNode> {
    delta
        .new_entities
        .iter_mut()
        .chain(delta.updated_entities.iter_mut())
}

/// Replace the edge with the same uuid wherever it sits in the delta, or
/// record it as an update of a stored edge.
fn upsert_edge(delta: &mut GraphDelta, edge: EntityEdge) {
    if let Some(slot) = delta.new_edges.iter_mut().find(|e| e.uuid == edge.uuid) {
        *slot = edge;
        return;
    }
    if let Some(slot) = delta.updated_edges.iter_mut().find(|e| e.uuid == edge.uuid) {
        *slot = edge;
        return;
    }
    delta.updated_edges.push(edge);
}

fn unique_in_order(uuids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = Vec::new();
    for uuid in uuids {
        if !seen.contains(&uuid) {
            seen.push(uuid);
        }
    }
    seen
}
