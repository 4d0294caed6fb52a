//! Shared test utilities for graph, expansion, and search testing

use crate::{
    expansion::ExpansionStore,
    graph::{GraphBuilder, NodeGraph},
    properties::{Record, RecordId},
};
use serde_json::json;

/// Initialize logging for tests
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A record with a display name and an `[id, label]` style parent reference.
pub fn record(id: i64, name: &str, parent: Option<i64>) -> Record {
    let record = Record::new(id).with("display_name", name);
    match parent {
        Some(parent) => record.with("parent_id", json!([parent, format!("Node {parent}")])),
        None => record.with("parent_id", false),
    }
}

pub fn ids(raw: &[i64]) -> Vec<RecordId> {
    raw.iter().map(|id| RecordId(*id)).collect()
}

/// Two roots, each with two children, each child with one grandchild:
///
/// ```text
/// 1 ─┬─ 11 ── 111
///    └─ 12 ── 121
/// 2 ─┬─ 21 ── 211
///    └─ 22 ── 221
/// ```
pub fn three_level_forest() -> Vec<Record> {
    let mut records = Vec::new();
    for root in [1, 2] {
        records.push(record(root, &format!("Root {root}"), None));
        for child in [root * 10 + 1, root * 10 + 2] {
            records.push(record(child, &format!("Child {child}"), Some(root)));
            records.push(record(
                child * 10 + 1,
                &format!("Grandchild {}", child * 10 + 1),
                Some(child),
            ));
        }
    }
    records
}

pub fn build_graph(records: &[Record], expansion: &mut ExpansionStore) -> NodeGraph {
    GraphBuilder::new("parent_id", "mindmap_color").build(records, &[], expansion)
}
