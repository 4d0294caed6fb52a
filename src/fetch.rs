//! Incremental descendant loading.
//!
//! A host that only knows the first level of a hierarchy (a one-to-many field, say) asks the
//! [`DescendantFetcher`] to walk the rest breadth-first through the [`RecordSource`]. The walk is
//! capped at [`MAX_FETCH_DEPTH`] levels, which bounds malformed parent data that keeps producing
//! unseen ids, and guarded so that only one walk runs at a time: a call that arrives while another
//! is in flight is dropped, not queued.

use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    error::MindmapError,
    properties::{Record, RecordId},
    query::{Filter, RecordSource},
};

/// Recursion cutoff for descendant walks.
pub const MAX_FETCH_DEPTH: usize = 10;

/// What a completed walk produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    /// Newly discovered descendants, level by level, each id at most once.
    pub records: Vec<Record>,
    /// Number of levels queried.
    pub levels: usize,
    /// True when the walk stopped at [`MAX_FETCH_DEPTH`] with ids still unexplored.
    pub truncated: bool,
    /// The error that ended the walk early, if any. `records` then holds the completed levels.
    pub error: Option<MindmapError>,
}

/// Releases the single-flight flag however the walk ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct DescendantFetcher {
    in_flight: AtomicBool,
}

impl DescendantFetcher {
    pub fn new() -> Self {
        DescendantFetcher::default()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.in_flight))
    }

    /// Walk the descendants of `root_ids`.
    ///
    /// Returns `None` without touching the source when another walk is in flight. Source errors
    /// never propagate: they end the walk and are reported in [`FetchResult::error`].
    #[tracing::instrument(skip(self, source, fields, root_ids), fields(roots = root_ids.len()))]
    pub async fn fetch<S: RecordSource>(
        &self,
        source: &S,
        model: &str,
        parent_field: &str,
        fields: &[String],
        root_ids: &[RecordId],
    ) -> Option<FetchResult> {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("Descendant fetch already in flight, dropping request");
            return None;
        };

        let mut result = FetchResult::default();
        let mut visited: BTreeSet<RecordId> = root_ids.iter().copied().collect();
        let mut level: Vec<RecordId> = visited.iter().copied().collect();

        while !level.is_empty() {
            if result.levels >= MAX_FETCH_DEPTH {
                tracing::warn!(
                    "Descendant fetch stopped at depth {} with {} ids unexplored",
                    MAX_FETCH_DEPTH,
                    level.len()
                );
                result.truncated = true;
                break;
            }
            let filter = Filter::parent_in(parent_field, level);
            let children = match source.search_by_filter(model, &filter, fields).await {
                Ok(children) => children,
                Err(e) => {
                    tracing::error!("Error fetching descendants at level {}: {e}", result.levels);
                    result.error = Some(e);
                    break;
                }
            };
            result.levels += 1;
            level = Vec::new();
            for child in children {
                if visited.insert(child.id) {
                    level.push(child.id);
                    result.records.push(child);
                }
            }
        }
        tracing::debug!(
            "Fetched {} descendants over {} levels",
            result.records.len(),
            result.levels
        );
        Some(result)
    }
}
