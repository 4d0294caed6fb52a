//! [crate::properties] contains the basic building blocks the rest of the crate assembles into
//! node graphs: record identities, the flat [`Record`] shape delivered by a
//! [`crate::query::RecordSource`], parent-reference normalization, and node color resolution.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::error::MindmapError;

/// Neutral color used when a record carries no usable color value.
pub const DEFAULT_NODE_COLOR: &str = "#dee2e6";

/// Integer color codes understood by [`resolve_color`]. Code 0 and anything past the table fall
/// back to [`DEFAULT_NODE_COLOR`].
pub const COLOR_PALETTE: [(i64, &str); 10] = [
    (1, "#6f42c1"),
    (2, "#007bff"),
    (3, "#17a2b8"),
    (4, "#fd7e14"),
    (5, "#dc3545"),
    (6, "#6610f2"),
    (7, "#d63384"),
    (8, "#fd7e14"),
    (9, "#28a745"),
    (10, "#20c997"),
];

/// Stable identity of a record, and of the node built from it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    /// Normalize a parent-reference attribute into a plain id.
    ///
    /// A reference may arrive as a bare id (`7` or `"7"`), as an `[id, label]` pair, or as an
    /// embedded object carrying an `id` field. All three yield the same id. Empty references
    /// (`null`, `false`, `0`, empty pairs) yield `None`.
    pub fn from_reference(value: &Value) -> Option<RecordId> {
        match value {
            Value::Number(num) => num.as_i64().filter(|id| *id != 0).map(RecordId),
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|id| *id != 0)
                .map(RecordId),
            Value::Array(pair) => pair.first().and_then(RecordId::from_reference),
            Value::Object(obj) => obj.get("id").and_then(RecordId::from_reference),
            Value::Null | Value::Bool(_) => None,
        }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = MindmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(RecordId)
            .map_err(|e| MindmapError::Serialization(format!("Invalid record id '{s}': {e}")))
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId(id)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        Value::from(id.0)
    }
}

/// A flat entity as delivered by a record source: an id plus an arbitrary attribute bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Record {
            id: id.into(),
            data: Map::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.data.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == "id" {
            return None;
        }
        self.data.get(field)
    }

    /// The normalized parent id stored under `parent_field`, if any.
    pub fn parent_id(&self, parent_field: &str) -> Option<RecordId> {
        self.data
            .get(parent_field)
            .and_then(RecordId::from_reference)
    }

    pub fn display_name(&self, name_field: &str) -> String {
        display_name(self.id, &self.data, name_field)
    }

    /// Keep only the listed fields. An empty list keeps everything.
    pub fn project(&self, fields: &[String]) -> Record {
        if fields.is_empty() {
            return self.clone();
        }
        let data = self
            .data
            .iter()
            .filter(|(key, _)| fields.iter().any(|f| f == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Record { id: self.id, data }
    }

    /// Overlay `other`'s attributes onto this record.
    pub fn merge(&mut self, other: &Record) {
        for (key, value) in other.data.iter() {
            self.data.insert(key.clone(), value.clone());
        }
    }
}

/// The label shown for `id`: its `name_field` string, or `#id` when the name is empty.
pub fn display_name(id: RecordId, data: &Map<String, Value>, name_field: &str) -> String {
    match data.get(name_field) {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Null) | Some(Value::Bool(false)) | None => format!("#{id}"),
        Some(other) => other.to_string(),
    }
}

/// Resolve a record's display color.
///
/// Literal `#rrggbb` strings pass through; integer codes (or numeric strings) are looked up in
/// [`COLOR_PALETTE`]; anything else is [`DEFAULT_NODE_COLOR`].
pub fn resolve_color(raw: Option<&Value>) -> String {
    let code = match raw {
        Some(Value::String(text)) if text.starts_with('#') => return text.clone(),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(Value::Number(num)) => num.as_i64(),
        _ => None,
    };
    code.and_then(|code| {
        COLOR_PALETTE
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, hex)| hex.to_string())
    })
    .unwrap_or_else(|| DEFAULT_NODE_COLOR.to_string())
}
