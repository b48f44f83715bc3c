//! Ingestion pipeline and engine facade.
//!
//! [`MemoryEngine`] owns the store and the three model-backed capabilities
//! and exposes the public operations: ingest, bulk ingest, recall, episode
//! listing, and scope deletion. Writes to one partition are serialized
//! through a keyed async lock so extract → resolve → commit runs without a
//! concurrent writer changing the partition underneath it; reads take no
//! lock and see the latest committed state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::dedup::DedupResolver;
use crate::embedder::EmbedderClient;
use crate::errors::{MemoryError, Result};
use crate::extraction::ExtractionAdapter;
use crate::llm_client::LlmClient;
use crate::nodes::{EpisodeNode, EpisodeSource};
use crate::reranker::RerankerClient;
use crate::scope::ScopeKey;
use crate::search::{RecallQuery, RecallResult, Searcher};
use crate::store::{DeletedCounts, GraphStore};
use crate::types::MemoryConfig;

/// One episode to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub content: String,
    pub scope: ScopeKey,
    pub source: EpisodeSource,
    /// When the episode happened; defaults to now.
    pub reference_time: Option<DateTime<Utc>>,
}

impl IngestRequest {
    pub fn new(content: impl Into<String>, scope: ScopeKey) -> Self {
        Self {
            content: content.into(),
            scope,
            source: EpisodeSource::Message,
            reference_time: None,
        }
    }
}

/// What one successful ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub episode_uuid: Uuid,
    pub episode_name: String,
    /// Entities created or reinforced by this episode.
    pub entities: usize,
    /// Edges created or updated by this episode.
    pub edges: usize,
}

/// The temporal knowledge-graph memory engine.
pub struct MemoryEngine<S, L, E, R> {
    store: S,
    llm: L,
    embedder: E,
    reranker: R,
    config: MemoryConfig,
    /// Per-partition write locks. The outer mutex only guards the map; the
    /// inner async mutex serializes the whole extract → resolve → commit
    /// sequence for one partition.
    write_locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, L, E, R> MemoryEngine<S, L, E, R>
where
    S: GraphStore,
    L: LlmClient,
    E: EmbedderClient,
    R: RerankerClient,
{
    pub fn new(store: S, llm: L, embedder: E, reranker: R, config: MemoryConfig) -> Self {
        Self {
            store,
            llm,
            embedder,
            reranker,
            config,
            write_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Verify the backing store is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Release store resources.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    #[cfg(test)]
    fn write_lock_entries(&self) -> usize {
        self.write_locks.lock().len()
    }

    fn write_lock(&self, partition: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.write_locks.lock();
        locks
            .entry(partition.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Ingest one episode: extract candidates, resolve them against the
    /// partition's graph, and commit the delta atomically.
    #[instrument(skip(self, request), fields(scope = %request.scope))]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResult> {
        let partition = request.scope.partition();
        let lock = self.write_lock(&partition);
        let _guard = lock.lock().await;
        self.ingest_locked(&partition, request).await
    }

    async fn ingest_locked(
        &self,
        partition: &str,
        request: IngestRequest,
    ) -> Result<IngestResult> {
        let reference_time = request.reference_time.unwrap_or_else(Utc::now);

        let adapter = ExtractionAdapter::new(&self.llm, &self.embedder);
        let candidates = adapter.extract(&request.content, reference_time).await?;

        let episode = EpisodeNode {
            uuid: Uuid::new_v4(),
            name: EpisodeNode::derive_name(partition, &reference_time),
            scope: partition.to_string(),
            session: request.scope.session().map(str::to_string),
            source: request.source,
            content: request.content,
            reference_time,
            created_at: Utc::now(),
        };
        let episode_uuid = episode.uuid;
        let episode_name = episode.name.clone();

        let resolver = DedupResolver::new(&self.store, &self.config);
        let mut delta = resolver
            .resolve(partition, episode_uuid, candidates)
            .await?;
        delta.episode = Some(episode);

        let entities = delta.mentions.len();
        let edges = delta.new_edges.len() + delta.updated_edges.len();
        self.store.commit(delta).await?;

        info!(
            partition,
            episode = %episode_name,
            entities,
            edges,
            "episode ingested"
        );

        Ok(IngestResult {
            episode_uuid,
            episode_name,
            entities,
            edges,
        })
    }

    /// Ingest a batch of episodes.
    ///
    /// Episodes for the same partition run sequentially in input order;
    /// different partitions run concurrently. One episode's failure does not
    /// abort the rest; the returned vector mirrors the input order with a
    /// per-episode outcome.
    pub async fn ingest_bulk(
        &self,
        requests: Vec<IngestRequest>,
    ) -> Vec<Result<IngestResult>> {
        let total = requests.len();

        // Group by partition, keeping each request's input position.
        let mut groups: HashMap<String, Vec<(usize, IngestRequest)>> = HashMap::new();
        for (index, request) in requests.into_iter().enumerate() {
            groups
                .entry(request.scope.partition())
                .or_default()
                .push((index, request));
        }

        let group_futures = groups.into_values().map(|group| async {
            let mut outcomes = Vec::with_capacity(group.len());
            for (index, request) in group {
                outcomes.push((index, self.ingest(request).await));
            }
            outcomes
        });

        let mut results: Vec<Option<Result<IngestResult>>> =
            (0..total).map(|_| None).collect();
        for outcomes in join_all(group_futures).await {
            for (index, outcome) in outcomes {
                results[index] = Some(outcome);
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(MemoryError::Validation(
                        "bulk ingestion lost an episode slot".to_string(),
                    ))
                })
            })
            .collect()
    }

    /// Hybrid recall over the scope's readable partitions. Lock-free:
    /// queries see the latest committed state.
    pub async fn recall(&self, query: &RecallQuery) -> Result<RecallResult> {
        Searcher::new(&self.store, &self.embedder, &self.reranker, &self.config)
            .recall(query)
            .await
    }

    /// Page through a scope's episodes, newest first.
    pub async fn list_episodes(
        &self,
        scope: &ScopeKey,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EpisodeNode>> {
        self.store
            .list_episodes(&scope.partition(), limit, offset)
            .await
    }

    /// Remove everything stored under the scope's write partition.
    ///
    /// Takes the partition's write lock so an in-flight ingestion cannot
    /// interleave with the wipe. Agent scopes delete only their own
    /// partition, never the parent user's.
    pub async fn delete_scope(&self, scope: &ScopeKey) -> Result<DeletedCounts> {
        let partition = scope.partition();
        let lock = self.write_lock(&partition);
        let _guard = lock.lock().await;

        let counts = self.store.delete_partition(&partition).await?;

        // Drop the partition's lock entry so the map doesn't accumulate one
        // mutex per partition ever touched. Two strong refs means only the
        // map and our own guard hold it; more means a waiter that still
        // needs the entry.
        {
            let mut locks = self.write_locks.lock();
            if let Some(entry) = locks.get(&partition) {
                if Arc::strong_count(entry) <= 2 {
                    locks.remove(&partition);
                }
            }
        }

        info!(
            partition,
            episodes = counts.episodes,
            entities = counts.entities,
            edges = counts.edges,
            "scope deleted"
        );
        Ok(counts)
    }
}
