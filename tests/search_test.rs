//! Search Integration Tests
//!
//! Filtered loads go through ancestor resolution, so every match is reachable by expanding visible
//! branches. Only the matches themselves are highlighted. These tests cover the search pass, the
//! fallback when ancestor resolution fails, leaving search mode, and the search debounce.

mod common;

use common::{ids, probe_engine, record, three_level_forest};
use mindmap_core::{
    engine::LoadParams,
    properties::{Record, RecordId},
    query::Filter,
};
use std::{
    collections::BTreeSet,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};
use test_log::test;

fn set(raw: &[i64]) -> BTreeSet<RecordId> {
    ids(raw).into_iter().collect()
}

fn name_filter(text: &str) -> Filter {
    Filter::name_matches("display_name", text).unwrap()
}

#[test(tokio::test)]
async fn test_search_highlights_leaf_and_opens_its_path() {
    let engine = probe_engine(vec![
        record(1, "Root", None),
        record(2, "Child", Some(1)),
        record(3, "Leaf", Some(2)),
        record(4, "Unrelated", None),
    ]);

    engine
        .load(LoadParams::filtered(name_filter("^leaf$")))
        .await
        .unwrap();

    assert!(engine.is_searching());
    assert_eq!(engine.highlights(), set(&[3]));
    assert_eq!(engine.expanded(), set(&[1, 2]));
    let graph = engine.graph();
    assert_eq!(graph.len(), 3);
    assert!(!graph.contains(RecordId(4)));
    let visible: Vec<RecordId> = engine.visible_rows().iter().map(|row| row.id).collect();
    assert_eq!(visible, ids(&[1, 2, 3]));
}

fn leaf_chain() -> Vec<Record> {
    vec![
        record(1, "Root", None),
        record(2, "Child", Some(1)),
        record(3, "Leaf", Some(2)),
        record(4, "Unrelated", None),
    ]
}

#[test(tokio::test)]
async fn test_rebuilds_during_search_keep_matches_reachable() {
    let engine = probe_engine(leaf_chain());
    engine
        .load(LoadParams::filtered(name_filter("^leaf$")))
        .await
        .unwrap();
    assert_eq!(engine.expanded(), set(&[1, 2]));

    engine.merge_saved_record(record(3, "Leaf", Some(2)));
    assert_eq!(engine.expanded(), set(&[1, 2]));
    assert_eq!(engine.highlights(), set(&[3]));

    let config = engine.config();
    engine.update_config(config).unwrap();
    assert_eq!(engine.expanded(), set(&[1, 2]));

    assert!(engine.fetch_descendants(&ids(&[1])).await);
    assert_eq!(engine.version(), 4);
    assert!(engine.is_searching());
    assert_eq!(engine.highlights(), set(&[3]));
    assert_eq!(engine.expanded(), set(&[1, 2]));
    let visible: Vec<RecordId> = engine.visible_rows().iter().map(|row| row.id).collect();
    assert_eq!(visible, ids(&[1, 2, 3]));
}

#[test(tokio::test)]
async fn test_default_pass_waits_until_search_ends() {
    let engine = probe_engine(leaf_chain());
    engine
        .load(LoadParams::filtered(name_filter("^leaf$")))
        .await
        .unwrap();
    engine.clear_highlights();

    // A rebuild in search mode neither restores cleared highlights nor runs the default pass.
    engine.set_primary_records(engine.primary_records());
    assert!(engine.highlights().is_empty());
    assert_eq!(engine.expanded(), set(&[1, 2]));

    engine.load(LoadParams::default()).await.unwrap();
    assert!(!engine.is_searching());
    // Roots only, the leaf root included.
    assert_eq!(engine.expanded(), set(&[1, 4]));
}

#[test(tokio::test)]
async fn test_search_with_matches_at_several_depths() {
    let engine = probe_engine(three_level_forest());

    engine
        .load(LoadParams::filtered(name_filter("^(Child 12|Grandchild 211)$")))
        .await
        .unwrap();

    assert_eq!(engine.highlights(), set(&[12, 211]));
    // 12 has no loaded children, so only its ancestors open.
    assert_eq!(engine.expanded(), set(&[1, 2, 21]));
    assert_eq!(engine.graph().len(), 5);
}

#[test(tokio::test)]
async fn test_clearing_filter_leaves_search_mode_and_resumes_default_expand() {
    let engine = probe_engine(three_level_forest());
    engine
        .load(LoadParams::filtered(name_filter("Grandchild 111")))
        .await
        .unwrap();
    assert_eq!(engine.expanded(), set(&[1, 11]));

    engine.load(LoadParams::default()).await.unwrap();

    assert!(!engine.is_searching());
    assert!(engine.highlights().is_empty());
    assert_eq!(engine.graph().len(), 10);
    // The filtered build did not count as the initial build.
    assert_eq!(engine.expanded(), set(&[1, 2]));
}

#[test(tokio::test)]
async fn test_ancestor_resolution_failure_falls_back_to_unfiltered_load() {
    let engine = probe_engine(three_level_forest());
    engine.source().fail_id_fetches.store(true, Ordering::SeqCst);

    engine
        .load(LoadParams::filtered(name_filter("Grandchild 111")))
        .await
        .unwrap();

    assert!(!engine.is_searching());
    assert!(engine.highlights().is_empty());
    assert_eq!(engine.graph().len(), 10);
    assert_eq!(engine.source().id_fetches.load(Ordering::SeqCst), 1);
}

#[test(tokio::test)]
async fn test_clear_highlights_keeps_search_mode() {
    let engine = probe_engine(three_level_forest());
    engine
        .load(LoadParams::filtered(name_filter("^Child 21$")))
        .await
        .unwrap();
    assert_eq!(engine.highlights(), set(&[21]));

    engine.clear_highlights();
    engine.clear_highlights();

    assert!(engine.highlights().is_empty());
    assert!(engine.is_searching());
    assert_eq!(engine.expanded(), set(&[2]));
}

#[test(tokio::test(start_paused = true))]
async fn test_search_is_debounced_to_last_input() {
    let engine = Arc::new(probe_engine(three_level_forest()));

    engine.search(name_filter("Grandchild 111"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.search(name_filter("Grandchild 221"));
    tokio::time::sleep(Duration::from_millis(399)).await;
    assert_eq!(engine.version(), 0);
    assert_eq!(engine.source().search_count(), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;

    assert_eq!(engine.version(), 1);
    assert_eq!(engine.highlights(), set(&[221]));
    // One query for the matches, one for the ancestor-inclusive load.
    assert_eq!(engine.source().search_count(), 2);
}
