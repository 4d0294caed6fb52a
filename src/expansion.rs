//! Per-node expand/collapse memory.
//!
//! Entries are keyed by [`RecordId`] and outlive every graph rebuild: a rebuild only adds entries
//! for ids it has not seen, and only explicit deletion removes one. The store itself never decides
//! *when* to reset state; the engine runs [`ExpansionStore::apply_default_depth`] once after its
//! first build, and the search pass forces paths open after filtered loads.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{config::DefaultDepth, graph::NodeGraph, properties::RecordId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionStore {
    entries: BTreeMap<RecordId, bool>,
}

impl ExpansionStore {
    pub fn new() -> Self {
        ExpansionStore::default()
    }

    /// Whether `id` is expanded. Untracked ids read as collapsed.
    pub fn get(&self, id: RecordId) -> bool {
        self.entries.get(&id).copied().unwrap_or(false)
    }

    /// Track `id` with the default collapsed state if it is not tracked yet.
    pub fn ensure(&mut self, id: RecordId) -> bool {
        *self.entries.entry(id).or_insert(false)
    }

    pub fn set(&mut self, id: RecordId, expanded: bool) {
        self.entries.insert(id, expanded);
    }

    /// Flip `id` and return the new state.
    pub fn toggle(&mut self, id: RecordId) -> bool {
        let state = self.entries.entry(id).or_insert(false);
        *state = !*state;
        *state
    }

    pub fn remove(&mut self, id: RecordId) -> Option<bool> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Force every tracked entry closed.
    pub fn collapse_all(&mut self) {
        for state in self.entries.values_mut() {
            *state = false;
        }
    }

    pub fn expanded(&self) -> BTreeSet<RecordId> {
        self.entries
            .iter()
            .filter(|(_, expanded)| **expanded)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Reset every entry, then open the top of each tree down to `depth`.
    ///
    /// A node at depth `d` (roots are 1) is opened when `d < depth`; its children are only visited
    /// when it was opened.
    pub fn apply_default_depth(&mut self, graph: &NodeGraph, depth: DefaultDepth) {
        self.collapse_all();
        let mut stack: Vec<(RecordId, u32)> =
            graph.roots().iter().rev().map(|id| (*id, 1)).collect();
        while let Some((id, level)) = stack.pop() {
            if level >= depth.levels() {
                continue;
            }
            self.set(id, true);
            if let Some(node) = graph.get(id) {
                stack.extend(node.children.iter().rev().map(|child| (*child, level + 1)));
            }
        }
        tracing::debug!(
            "Default expansion to depth {} opened {} nodes",
            depth,
            self.expanded().len()
        );
    }
}
