//! Recall behavior tests: filtering, ranking, degradation.

mod common;

use common::{engine, user_scope};
use engram_rs::pipeline::IngestRequest;
use engram_rs::search::RecallQuery;

#[tokio::test]
async fn min_salience_surfaces_failures_over_routine_facts() {
    let engine = engine();
    let scope = user_scope("u1");

    engine
        .ingest(IngestRequest::new("likes coffee in the morning", scope.clone()))
        .await
        .unwrap();
    engine
        .ingest(IngestRequest::new("deploy failure on staging", scope.clone()))
        .await
        .unwrap();

    // Unfiltered recall sees both the routine fact and the failure.
    let result = engine
        .recall(&RecallQuery::new("deploy went wrong", scope.clone()))
        .await
        .unwrap();
    let names: Vec<&str> = result.nodes.iter().map(|s| s.item.name.as_str()).collect();
    assert!(names.contains(&"Coffee preference"));
    assert!(names.contains(&"Deploy failed"));

    // A salience floor of 9 keeps only the failure (default salience 9);
    // the routine fact (default 5) is filtered out.
    let mut query = RecallQuery::new("deploy went wrong", scope.clone());
    query.min_salience = Some(9);
    let result = engine.recall(&query).await.unwrap();
    let names: Vec<&str> = result.nodes.iter().map(|s| s.item.name.as_str()).collect();
    assert!(names.contains(&"Deploy failed"));
    assert!(!names.contains(&"Coffee preference"));

    // Episodes are exempt from the salience floor.
    assert!(!result.episodes.is_empty());
}

#[tokio::test]
async fn scores_are_monotonically_non_increasing() {
    let engine = engine();
    let scope = user_scope("u1");

    engine
        .ingest(IngestRequest::new("Alice joined Acme", scope.clone()))
        .await
        .unwrap();
    engine
        .ingest(IngestRequest::new("likes coffee", scope.clone()))
        .await
        .unwrap();
    engine
        .ingest(IngestRequest::new("deploy failure yesterday", scope.clone()))
        .await
        .unwrap();

    let result = engine
        .recall(&RecallQuery::new("where does Alice work", scope))
        .await
        .unwrap();

    for pair in result.edges.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for pair in result.nodes.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for pair in result.episodes.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn limit_bounds_every_category() {
    let engine = engine();
    let scope = user_scope("u1");

    engine
        .ingest(IngestRequest::new("Alice joined Acme", scope.clone()))
        .await
        .unwrap();
    engine
        .ingest(IngestRequest::new("deploy failure on staging", scope.clone()))
        .await
        .unwrap();

    let mut query = RecallQuery::new("Alice", scope);
    query.limit = Some(1);
    let result = engine.recall(&query).await.unwrap();
    assert!(result.edges.len() <= 1);
    assert!(result.nodes.len() <= 1);
    assert!(result.episodes.len() <= 1);
}

#[tokio::test]
async fn recall_on_empty_scope_returns_empty_result() {
    let engine = engine();
    let result = engine
        .recall(&RecallQuery::new("anything at all", user_scope("nobody")))
        .await
        .unwrap();
    assert!(result.edges.is_empty());
    assert!(result.nodes.is_empty());
    assert!(result.episodes.is_empty());
    assert!(result.communities.is_empty());
}

#[tokio::test]
async fn lexical_signal_finds_episodes_by_content() {
    let engine = engine();
    let scope = user_scope("u1");

    engine
        .ingest(IngestRequest::new(
            "deploy failure during the midnight release window",
            scope.clone(),
        ))
        .await
        .unwrap();
    engine
        .ingest(IngestRequest::new("likes coffee with oat milk", scope.clone()))
        .await
        .unwrap();

    let result = engine
        .recall(&RecallQuery::new("midnight release", scope))
        .await
        .unwrap();
    assert!(!result.episodes.is_empty());
    assert!(result.episodes[0].item.content.contains("midnight release"));
}
