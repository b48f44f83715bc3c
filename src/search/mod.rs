//! Hybrid recall: vector, lexical, and graph-traversal signals fused into
//! one ranked result set.
//!
//! Each signal runs independently over the scope's readable partitions:
//! embedding cosine similarity, BM25 fulltext, and bounded BFS outward from
//! the best vector- and lexically-matched entities with per-hop score decay. Scores are
//! min-max normalized per signal, combined with configured weights, filtered
//! (salience floor, historical edges), then the top fused candidates go
//! through the cross-encoder reranker. A signal or reranker failure degrades
//! the ranking rather than failing the query.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::embedder::EmbedderClient;
use crate::errors::Result;
use crate::nodes::{CommunityNode, EntityNode, EpisodeNode};
use crate::edges::EntityEdge;
use crate::reranker::RerankerClient;
use crate::scope::ScopeKey;
use crate::store::{FulltextHits, GraphStore, TraversalHits};
use crate::types::MemoryConfig;
use crate::utils::truncate_with_ellipsis;

/// Default number of results per category.
pub const DEFAULT_LIMIT: usize = 10;
/// Hard cap on results per category.
pub const MAX_LIMIT: usize = 100;

/// How many top entities per signal seed the graph traversal.
const TRAVERSAL_SEEDS: usize = 5;
/// Passage length cap for reranking episode content.
const EPISODE_PASSAGE_CHARS: usize = 800;

/// A recall request.
#[derive(Debug, Clone)]
pub struct RecallQuery {
    pub query: String,
    pub scope: ScopeKey,
    /// Results per category; clamped into `1..=100`, default 10.
    pub limit: Option<usize>,
    /// Drop entities and edges below this salience. Episodes are exempt.
    pub min_salience: Option<u8>,
    /// Include superseded (invalidated) edges. Off by default: recall
    /// answers "what is true now" unless history is asked for.
    pub include_historical: bool,
}

impl RecallQuery {
    pub fn new(query: impl Into<String>, scope: ScopeKey) -> Self {
        Self {
            query: query.into(),
            scope,
            limit: None,
            min_salience: None,
            include_historical: false,
        }
    }

    fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// One ranked item with its final relevance score.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub score: f32,
    pub item: T,
}

/// Ranked recall output, per result kind.
#[derive(Debug, Clone, Default)]
pub struct RecallResult {
    pub edges: Vec<Scored<EntityEdge>>,
    pub nodes: Vec<Scored<EntityNode>>,
    pub episodes: Vec<Scored<EpisodeNode>>,
    pub communities: Vec<Scored<CommunityNode>>,
}

/// Executes recall queries against a store, embedder, and reranker.
pub struct Searcher<'a, S, E, R> {
    store: &'a S,
    embedder: &'a E,
    reranker: &'a R,
    config: &'a MemoryConfig,
}

impl<'a, S, E, R> Searcher<'a, S, E, R>
where
    S: GraphStore,
    E: EmbedderClient,
    R: RerankerClient,
{
    pub fn new(store: &'a S, embedder: &'a E, reranker: &'a R, config: &'a MemoryConfig) -> Self {
        Self {
            store,
            embedder,
            reranker,
            config,
        }
    }

    pub async fn recall(&self, request: &RecallQuery) -> Result<RecallResult> {
        let partitions = request.scope.read_keys();
        let k = self.config.signal_top_k;

        // Vector signal. An embedding failure silences this signal and the
        // traversal seeds, leaving the lexical signal to carry the query.
        let query_embedding = match self.embedder.embed(&request.query).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(error = %e, "query embedding failed; vector signal skipped");
                None
            }
        };

        let (vector_edges, vector_nodes) = match &query_embedding {
            Some(embedding) => {
                let (edges, nodes) = tokio::join!(
                    self.store.similar_edges(&partitions, embedding, k),
                    self.store.similar_nodes(&partitions, embedding, k),
                );
                (
                    signal_or_empty(edges, "vector edge"),
                    signal_or_empty(nodes, "vector node"),
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        // Lexical signal.
        let fulltext = match self
            .store
            .fulltext_search(&partitions, &request.query, k)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "fulltext search failed; lexical signal skipped");
                FulltextHits::default()
            }
        };

        // Graph signal: walk outward from the best vector-matched and
        // lexically-matched entities, discounting each hop. Lexical seeds
        // keep the traversal alive when the embedder is down.
        let mut seeds: Vec<Uuid> = vector_nodes
            .iter()
            .take(TRAVERSAL_SEEDS)
            .map(|(_, n)| n.uuid)
            .collect();
        for (_, n) in fulltext.nodes.iter().take(TRAVERSAL_SEEDS) {
            if !seeds.contains(&n.uuid) {
                seeds.push(n.uuid);
            }
        }
        let traversal = if seeds.is_empty() {
            TraversalHits::default()
        } else {
            match self
                .store
                .neighborhood(&partitions, &seeds, self.config.traversal_depth)
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(error = %e, "graph traversal failed; graph signal skipped");
                    TraversalHits::default()
                }
            }
        };
        let decay = self.config.traversal_hop_decay;
        let graph_nodes: Vec<(f32, EntityNode)> = traversal
            .nodes
            .into_iter()
            .map(|(hop, n)| (decay.powi(hop as i32), n))
            .collect();
        let graph_edges: Vec<(f32, EntityEdge)> = traversal
            .edges
            .into_iter()
            .map(|(hop, e)| (decay.powi(hop as i32), e))
            .collect();

        // Fusion: normalize per signal, weight, sum per uuid.
        let weights = self.config.fusion_weights;
        let mut edges = fuse(
            [
                (weights.vector, vector_edges),
                (weights.lexical, fulltext.edges),
                (weights.graph, graph_edges),
            ],
            |e| e.uuid,
        );
        let mut nodes = fuse(
            [
                (weights.vector, vector_nodes),
                (weights.lexical, fulltext.nodes),
                (weights.graph, graph_nodes),
            ],
            |n| n.uuid,
        );
        let mut episodes = fuse([(weights.lexical, fulltext.episodes)], |e| e.uuid);
        let mut communities = fuse([(weights.lexical, fulltext.communities)], |c| c.uuid);

        // Filters run before reranking so the cross-encoder never sees
        // items the caller can't receive.
        if !request.include_historical {
            edges.retain(|s| s.item.is_current());
        }
        if let Some(floor) = request.min_salience {
            edges.retain(|s| s.item.salience >= floor);
            nodes.retain(|s| s.item.salience >= floor);
        }

        self.rerank(&request.query, &mut edges, &mut nodes, &mut episodes, &mut communities)
            .await;

        // Final ordering: score descending; edges tie-break on the more
        // recently valid fact.
        edges.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.item.valid_at.cmp(&a.item.valid_at))
        });
        nodes.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.item.salience.cmp(&a.item.salience))
        });
        episodes.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.item.reference_time.cmp(&a.item.reference_time))
        });
        communities.sort_by(|a, b| b.score.total_cmp(&a.score));

        let limit = request.effective_limit();
        edges.truncate(limit);
        nodes.truncate(limit);
        episodes.truncate(limit);
        communities.truncate(limit);

        debug!(
            query = %request.query,
            edges = edges.len(),
            nodes = nodes.len(),
            episodes = episodes.len(),
            "recall complete"
        );

        Ok(RecallResult {
            edges,
            nodes,
            episodes,
            communities,
        })
    }

    /// Rescore the top fused candidates with the cross-encoder. On failure
    /// the fused scores stand.
    async fn rerank(
        &self,
        query: &str,
        edges: &mut [Scored<EntityEdge>],
        nodes: &mut [Scored<EntityNode>],
        episodes: &mut [Scored<EpisodeNode>],
        communities: &mut [Scored<CommunityNode>],
    ) {
        // Candidates across categories, best fused scores first.
        let mut candidates: Vec<(f32, Slot, String)> = Vec::new();
        for (i, s) in edges.iter().enumerate() {
            candidates.push((s.score, Slot::Edge(i), s.item.fact.clone()));
        }
        for (i, s) in nodes.iter().enumerate() {
            let passage = format!("{} ({})", s.item.name, s.item.label);
            candidates.push((s.score, Slot::Node(i), passage));
        }
        for (i, s) in episodes.iter().enumerate() {
            let passage = truncate_with_ellipsis(&s.item.content, EPISODE_PASSAGE_CHARS);
            candidates.push((s.score, Slot::Episode(i), passage));
        }
        for (i, s) in communities.iter().enumerate() {
            candidates.push((s.score, Slot::Community(i), s.item.summary.clone()));
        }

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates.truncate(self.config.rerank_top_n);
        if candidates.is_empty() {
            return;
        }

        let passages: Vec<String> = candidates.iter().map(|(_, _, p)| p.clone()).collect();
        let scores = match self.reranker.rank(query, &passages).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "reranking failed; keeping fused scores");
                return;
            }
        };

        for ((_, slot, _), score) in candidates.iter().zip(scores) {
            match *slot {
                Slot::Edge(i) => edges[i].score = score,
                Slot::Node(i) => nodes[i].score = score,
                Slot::Episode(i) => episodes[i].score = score,
                Slot::Community(i) => communities[i].score = score,
            }
        }
    }
}

/// Position of a rerank candidate in its category vector.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Edge(usize),
    Node(usize),
    Episode(usize),
    Community(usize),
}

fn signal_or_empty<T>(result: Result<Vec<(f32, T)>>, signal: &str) -> Vec<(f32, T)> {
    match result {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, signal, "retrieval signal failed; skipped");
            Vec::new()
        }
    }
}

/// Min-max normalize each signal's scores into `[0, 1]`, then sum them per
/// uuid with the given weights. An item seen by several signals accumulates
/// each weighted contribution.
fn fuse<T: Clone, const N: usize>(
    signals: [(f32, Vec<(f32, T)>); N],
    uuid_of: impl Fn(&T) -> Uuid,
) -> Vec<Scored<T>> {
    let mut fused: HashMap<Uuid, Scored<T>> = HashMap::new();

    for (weight, hits) in signals {
        if weight <= 0.0 || hits.is_empty() {
            continue;
        }
        let min = hits.iter().map(|(s, _)| *s).fold(f32::INFINITY, f32::min);
        let max = hits
            .iter()
            .map(|(s, _)| *s)
            .fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;

        for (score, item) in hits {
            // Degenerate ranges (single hit or all-equal scores) count fully.
            let normalized = if range > 0.0 { (score - min) / range } else { 1.0 };
            let contribution = weight * normalized;
            fused
                .entry(uuid_of(&item))
                .and_modify(|s| s.score += contribution)
                .or_insert(Scored {
                    score: contribution,
                    item,
                });
        }
    }

    fused.into_values().collect()
}
