//! Node graph data structures and the builder that produces them.
//!
//! - [`Node`]: one record wrapped for display, with index-based parent/children links
//! - [`NodeGraph`]: the node map plus the ordered root list, always fully consistent
//! - [`GraphBuilder`]: turns the primary and fetched record sets into a fresh [`NodeGraph`]
//!
//! Ownership flows parent to children through the node map; a node's `parent` is only an id to
//! look up, so the graph never forms reference cycles even when the input data does.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::{algo::is_cyclic_directed, graphmap::DiGraphMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    config::MindmapConfig,
    error::MindmapError,
    expansion::ExpansionStore,
    properties::{display_name, resolve_color, Record, RecordId},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: RecordId,
    /// Back-reference only. Resolve it through [`NodeGraph::get`].
    pub parent: Option<RecordId>,
    /// In record processing order, not sorted.
    pub children: Vec<RecordId>,
    pub data: Map<String, Value>,
    /// Resolved display color, always a `#rrggbb` string.
    pub color: String,
}

impl Node {
    fn from_record(record: &Record, color_field: &str) -> Node {
        Node {
            id: record.id,
            parent: None,
            children: Vec::new(),
            data: record.data.clone(),
            color: resolve_color(record.data.get(color_field)),
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn name(&self, name_field: &str) -> String {
        display_name(self.id, &self.data, name_field)
    }
}

/// A row of the currently visible tree: the node and its depth (roots are depth 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: RecordId,
    pub depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeGraph {
    nodes: BTreeMap<RecordId, Node>,
    roots: Vec<RecordId>,
}

impl NodeGraph {
    pub fn get(&self, id: RecordId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[RecordId] {
        &self.roots
    }

    pub fn nodes(&self) -> &BTreeMap<RecordId, Node> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: RecordId) -> &[RecordId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: RecordId) -> Option<RecordId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: RecordId) -> Vec<RecordId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            // Built graphs are acyclic; this only stops a walk over a hand-assembled one.
            if chain.contains(&parent) || parent == id {
                break;
            }
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    /// Depth of `id` in its tree, roots being depth 1.
    pub fn depth_of(&self, id: RecordId) -> Option<usize> {
        self.nodes
            .contains_key(&id)
            .then(|| self.ancestors(id).len() + 1)
    }

    /// Flatten the tree into the rows a renderer would show: pre-order, and only expanded nodes
    /// contribute their children.
    pub fn visible_rows(&self, expansion: &ExpansionStore) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        let mut stack: Vec<VisibleRow> = self
            .roots
            .iter()
            .rev()
            .map(|id| VisibleRow { id: *id, depth: 1 })
            .collect();
        while let Some(row) = stack.pop() {
            rows.push(row);
            if expansion.get(row.id) {
                stack.extend(self.children(row.id).iter().rev().map(|child| VisibleRow {
                    id: *child,
                    depth: row.depth + 1,
                }));
            }
        }
        rows
    }

    /// Parent-to-child edges as a petgraph map.
    pub fn as_graph(&self) -> DiGraphMap<RecordId, ()> {
        let mut graph = DiGraphMap::new();
        for id in self.nodes.keys() {
            graph.add_node(*id);
        }
        for node in self.nodes.values() {
            for child in node.children.iter() {
                graph.add_edge(node.id, *child, ());
            }
        }
        graph
    }

    /// Validate the structural invariants: parent and children links agree, the root list is
    /// exactly the set of parentless nodes, and no node is its own ancestor.
    pub fn check(&self) -> Result<(), MindmapError> {
        let mut errors = Vec::<String>::new();
        let root_set: BTreeSet<RecordId> = self.roots.iter().copied().collect();
        if root_set.len() != self.roots.len() {
            errors.push("root list contains duplicates".to_string());
        }
        for root in self.roots.iter() {
            match self.nodes.get(root) {
                None => errors.push(format!("root {root} is not in the node map")),
                Some(node) if node.parent.is_some() => {
                    errors.push(format!("root {root} has parent {:?}", node.parent))
                }
                _ => {}
            }
        }
        for node in self.nodes.values() {
            match node.parent {
                Some(parent_id) => match self.nodes.get(&parent_id) {
                    None => errors.push(format!(
                        "node {} references missing parent {parent_id}",
                        node.id
                    )),
                    Some(parent) => {
                        let count = parent.children.iter().filter(|c| **c == node.id).count();
                        if count != 1 {
                            errors.push(format!(
                                "node {} appears {count} times in children of {parent_id}",
                                node.id
                            ));
                        }
                    }
                },
                None => {
                    if !root_set.contains(&node.id) {
                        errors.push(format!("parentless node {} is not a root", node.id));
                    }
                }
            }
            for child in node.children.iter() {
                if self.parent(*child) != Some(node.id) {
                    errors.push(format!(
                        "child {child} of {} does not point back to it",
                        node.id
                    ));
                }
            }
        }
        if is_cyclic_directed(&self.as_graph()) {
            errors.push("parent chain contains a cycle".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MindmapError::Custom(errors.join("\n- ")))
        }
    }
}

/// Builds a [`NodeGraph`] from flat records.
///
/// [`GraphBuilder::build`] is a pure function of its record inputs plus the expansion store, which
/// it only extends with collapsed entries for ids it has not seen before.
#[derive(Debug, Clone)]
pub struct GraphBuilder<'a> {
    parent_field: &'a str,
    color_field: &'a str,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(parent_field: &'a str, color_field: &'a str) -> Self {
        GraphBuilder {
            parent_field,
            color_field,
        }
    }

    pub fn from_config(config: &'a MindmapConfig) -> Self {
        GraphBuilder::new(&config.parent_field, &config.color_field)
    }

    /// Primary records first, then fetched records whose id the primary set does not already
    /// carry. A repeated id keeps its first occurrence.
    pub fn merge<'r>(&self, primary: &'r [Record], extra: &'r [Record]) -> Vec<&'r Record> {
        let mut seen = BTreeSet::new();
        primary
            .iter()
            .chain(extra.iter())
            .filter(|record| seen.insert(record.id))
            .collect()
    }

    pub fn build(
        &self,
        primary: &[Record],
        extra: &[Record],
        expansion: &mut ExpansionStore,
    ) -> NodeGraph {
        let records = self.merge(primary, extra);
        let mut graph = NodeGraph::default();

        for record in records.iter() {
            graph
                .nodes
                .insert(record.id, Node::from_record(record, self.color_field));
            expansion.ensure(record.id);
        }

        let mut cycles = 0;
        for record in records.iter() {
            let id = record.id;
            let parent_id = record
                .parent_id(self.parent_field)
                .filter(|parent_id| graph.nodes.contains_key(parent_id));
            let Some(parent_id) = parent_id else {
                // No parent, or the parent lies outside the loaded scope.
                graph.roots.push(id);
                continue;
            };
            if closes_cycle(&graph.nodes, id, parent_id) {
                cycles += 1;
                tracing::debug!("Attaching {id} under {parent_id} would close a cycle, rooting it");
                graph.roots.push(id);
                continue;
            }
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.parent = Some(parent_id);
            }
            if let Some(parent) = graph.nodes.get_mut(&parent_id) {
                parent.children.push(id);
            }
        }

        if cycles > 0 {
            tracing::warn!("Broke {} parent cycle(s) while building the node graph", cycles);
        }
        tracing::debug!(
            "Built node graph: {} nodes, {} roots ({} primary, {} fetched records)",
            graph.nodes.len(),
            graph.roots.len(),
            primary.len(),
            extra.len()
        );
        debug_assert!(graph.check().is_ok(), "{:?}", graph.check());
        graph
    }
}

/// True when `id` already appears on the parent chain starting at `parent_id`.
fn closes_cycle(nodes: &BTreeMap<RecordId, Node>, id: RecordId, parent_id: RecordId) -> bool {
    let mut current = Some(parent_id);
    while let Some(ancestor) = current {
        if ancestor == id {
            return true;
        }
        current = nodes.get(&ancestor).and_then(|node| node.parent);
    }
    false
}
