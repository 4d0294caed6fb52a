//! Search-driven highlighting and path revelation.
//!
//! After a filtered load, every node that survived the ancestor-inclusive filter must be reachable
//! by expanding visible branches only, while just the nodes the filter itself matched get
//! highlighted. Ancestors pulled in for reachability are opened but never highlighted.

use std::collections::BTreeSet;

use crate::{expansion::ExpansionStore, graph::NodeGraph, properties::RecordId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHighlighter {
    active: bool,
    /// Match set of the last filtered load, re-applied on rebuilds while search is active.
    matched: BTreeSet<RecordId>,
    highlights: BTreeSet<RecordId>,
}

impl SearchHighlighter {
    pub fn new() -> Self {
        SearchHighlighter::default()
    }

    /// Whether the last completed load was filtered.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn highlights(&self) -> &BTreeSet<RecordId> {
        &self.highlights
    }

    pub fn is_highlighted(&self, id: RecordId) -> bool {
        self.highlights.contains(&id)
    }

    /// Apply a completed filtered load.
    ///
    /// Collapses every entry, then opens the path to every node in `graph` (the full visible set,
    /// not just matches). The highlight set becomes exactly the `matched` ids present in `graph`.
    pub fn apply_filter(
        &mut self,
        graph: &NodeGraph,
        expansion: &mut ExpansionStore,
        matched: &BTreeSet<RecordId>,
    ) {
        self.active = true;
        self.matched = matched.clone();
        expansion.collapse_all();
        for id in graph.nodes().keys() {
            expand_path_to_root(graph, expansion, *id);
        }
        self.highlights = matched
            .iter()
            .filter(|id| graph.contains(**id))
            .copied()
            .collect();
        tracing::debug!(
            "Search pass: {} highlighted, {} expanded",
            self.highlights.len(),
            expansion.expanded().len()
        );
    }

    /// Re-run the search pass over a rebuilt graph with the stored match set. Does nothing
    /// outside search mode.
    pub fn reapply(&mut self, graph: &NodeGraph, expansion: &mut ExpansionStore) {
        if !self.active {
            return;
        }
        let matched = std::mem::take(&mut self.matched);
        self.apply_filter(graph, expansion, &matched);
    }

    /// Leave search mode. The default-expand policy governs future initial builds again.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.matched.clear();
        self.highlights.clear();
    }

    /// Drop all highlights without touching search mode. Returns whether anything was cleared.
    ///
    /// Cleared matches stay cleared across rebuilds; their paths remain open.
    pub fn clear_highlights(&mut self) -> bool {
        self.matched.clear();
        if self.highlights.is_empty() {
            return false;
        }
        self.highlights.clear();
        true
    }
}

/// Open `id` itself when it has children, and every ancestor above it.
pub fn expand_path_to_root(graph: &NodeGraph, expansion: &mut ExpansionStore, id: RecordId) {
    let Some(node) = graph.get(id) else {
        return;
    };
    if node.has_children() {
        expansion.set(id, true);
    }
    for ancestor in graph.ancestors(id) {
        expansion.set(ancestor, true);
    }
}
