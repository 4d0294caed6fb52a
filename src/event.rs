use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::properties::RecordId;

/// Notifications a [`crate::engine::SyncEngine`] emits after its state has changed. Every event
/// is sent only once the state it describes is visible through the engine's accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MindmapEvent {
    /// A rebuild completed. Version, node count, root count
    GraphRebuilt {
        version: u64,
        nodes: usize,
        roots: usize,
    },
    /// Node id, new expanded state
    ExpansionChanged(RecordId, bool),
    /// The highlight set was emptied by an explicit clear.
    HighlightsCleared,
    /// The record was deleted from the source and dropped from the local sets.
    RecordDeleted(RecordId),
    /// Hover card data for the node is now cached.
    ExtraDataLoaded(RecordId),
}

impl MindmapEvent {
    /// The node this event concerns, if it concerns a single node.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            MindmapEvent::ExpansionChanged(id, _)
            | MindmapEvent::RecordDeleted(id)
            | MindmapEvent::ExtraDataLoaded(id) => Some(*id),
            MindmapEvent::GraphRebuilt { .. } | MindmapEvent::HighlightsCleared => None,
        }
    }
}

impl Display for MindmapEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            MindmapEvent::GraphRebuilt { version, .. } => write!(f, "GraphRebuilt(v{version})"),
            MindmapEvent::ExpansionChanged(id, expanded) => {
                write!(f, "ExpansionChanged({id}, {expanded})")
            }
            MindmapEvent::HighlightsCleared => write!(f, "HighlightsCleared"),
            MindmapEvent::RecordDeleted(id) => write!(f, "RecordDeleted({id})"),
            MindmapEvent::ExtraDataLoaded(id) => write!(f, "ExtraDataLoaded({id})"),
        }
    }
}
