//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use mindmap_core::{
    config::MindmapConfig,
    engine::SyncEngine,
    properties::{Record, RecordId},
    query::{CardField, Filter, RecordSource},
    store::RecordStore,
    MindmapError,
};
use parking_lot::Mutex;
use serde_json::json;

pub const MODEL: &str = "mindmap.node";

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times. Subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A record with a display name and an `[id, label]` style parent reference.
#[allow(dead_code)]
pub fn record(id: i64, name: &str, parent: Option<i64>) -> Record {
    let record = Record::new(id).with("display_name", name);
    match parent {
        Some(parent) => record.with("parent_id", json!([parent, format!("Node {parent}")])),
        None => record.with("parent_id", false),
    }
}

#[allow(dead_code)]
pub fn ids(raw: &[i64]) -> Vec<RecordId> {
    raw.iter().map(|id| RecordId(*id)).collect()
}

/// `0 <- 1 <- 2 <- ... <- last`, each level the only child of the one before.
#[allow(dead_code)]
pub fn chain(last: i64) -> Vec<Record> {
    (0..=last)
        .map(|id| record(id, &format!("Level {id}"), (id > 0).then(|| id - 1)))
        .collect()
}

/// A [`RecordStore`] wrapper that counts calls and fails on demand.
#[derive(Default)]
pub struct ProbeSource {
    pub store: RecordStore,
    /// Every filter passed to `search_by_filter`, in call order.
    pub searches: Mutex<Vec<Filter>>,
    pub id_fetches: AtomicUsize,
    pub card_fetches: AtomicUsize,
    pub deletes: AtomicUsize,
    /// Yield to the scheduler once inside each search, so concurrent callers interleave.
    pub yield_on_search: AtomicBool,
    /// Fail every search once this many searches have been made.
    pub fail_searches_after: Mutex<Option<usize>>,
    pub fail_id_fetches: AtomicBool,
    pub fail_card_fetches: AtomicBool,
    pub fail_deletes: AtomicBool,
}

#[allow(dead_code)]
impl ProbeSource {
    pub fn with_records(records: Vec<Record>) -> Self {
        let probe = ProbeSource::default();
        probe.store.insert_all(MODEL, records);
        probe
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().len()
    }

    pub fn parent_in_searches(&self) -> usize {
        self.searches
            .lock()
            .iter()
            .filter(|f| matches!(f, Filter::ParentIn { .. }))
            .count()
    }

    pub fn set_fail_searches_after(&self, after: Option<usize>) {
        *self.fail_searches_after.lock() = after;
    }

    pub fn reset_counts(&self) {
        self.searches.lock().clear();
        self.id_fetches.store(0, Ordering::SeqCst);
        self.card_fetches.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }
}

impl RecordSource for ProbeSource {
    async fn search_by_filter(
        &self,
        model: &str,
        filter: &Filter,
        fields: &[String],
    ) -> Result<Vec<Record>, MindmapError> {
        let succeeded = {
            let mut searches = self.searches.lock();
            let succeeded = searches.len();
            searches.push(filter.clone());
            succeeded
        };
        if self.yield_on_search.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        let fail_after = *self.fail_searches_after.lock();
        if fail_after.is_some_and(|after| succeeded >= after) {
            return Err(MindmapError::Source("search unavailable".to_string()));
        }
        self.store.search_by_filter(model, filter, fields).await
    }

    async fn fetch_by_ids(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[String],
    ) -> Result<Vec<Record>, MindmapError> {
        self.id_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_id_fetches.load(Ordering::SeqCst) {
            return Err(MindmapError::Source("read unavailable".to_string()));
        }
        self.store.fetch_by_ids(model, ids, fields).await
    }

    async fn delete_by_id(&self, model: &str, ids: &[RecordId]) -> Result<(), MindmapError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MindmapError::Source("unlink refused".to_string()));
        }
        self.store.delete_by_id(model, ids).await
    }

    async fn fetch_card_data(
        &self,
        model: &str,
        id: RecordId,
    ) -> Result<Vec<CardField>, MindmapError> {
        self.card_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_card_fetches.load(Ordering::SeqCst) {
            return Err(MindmapError::Source("card data unavailable".to_string()));
        }
        self.store.fetch_card_data(model, id).await
    }
}

/// An engine over a [`ProbeSource`] holding `records`, with default configuration.
#[allow(dead_code)]
pub fn probe_engine(records: Vec<Record>) -> SyncEngine<ProbeSource> {
    SyncEngine::new(
        ProbeSource::with_records(records),
        MindmapConfig::for_model(MODEL),
    )
    .unwrap()
}

/// Two roots, each with two children, each child with one grandchild:
///
/// ```text
/// 1 ─┬─ 11 ── 111
///    └─ 12 ── 121
/// 2 ─┬─ 21 ── 211
///    └─ 22 ── 221
/// ```
#[allow(dead_code)]
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
