use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

use regex::{escape as re_escape, Regex, RegexBuilder};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{
    properties::{Record, RecordId},
    MindmapError,
};

/// Recursion cutoff for upward ancestor resolution. Parent chains in real data are far shallower;
/// this only bounds malformed chains that keep producing unseen ids.
pub const MAX_ANCESTOR_TRAVERSAL: usize = 256;

/// Case-insensitive regex that survives (de)serialization as its source string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedRegex(
    #[serde(serialize_with = "serialize_regex")]
    #[serde(deserialize_with = "deserialize_regex")]
    Regex,
);

fn serialize_regex<S>(re: &Regex, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(re.as_str())
}

struct ReVisitor;

impl<'de> de::Visitor<'de> for ReVisitor {
    type Value = Regex;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "A regex string, as validated by the Rust regex crate (https://docs.rs/regex/latest/regex/index.html)", )
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        RegexBuilder::new(s)
            .unicode(true)
            .case_insensitive(true)
            .build()
            .map_err(|_e| E::invalid_value(de::Unexpected::Str(s), &self))
    }
}

fn deserialize_regex<'de, D>(deserializer: D) -> Result<Regex, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_str(ReVisitor)
}

impl Hash for WrappedRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_str().hash(state);
    }
}

impl PartialEq for WrappedRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for WrappedRegex {}

impl TryFrom<&str> for WrappedRegex {
    type Error = MindmapError;

    /// Search text that is not a valid regex is matched literally. Only text too large to compile
    /// even once escaped is an error.
    fn try_from(other: &str) -> Result<WrappedRegex, MindmapError> {
        let re = RegexBuilder::new(other)
            .unicode(true)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&re_escape(other))
                    .unicode(true)
                    .case_insensitive(true)
                    .build()
            })?;
        Ok(WrappedRegex(re))
    }
}

impl Deref for WrappedRegex {
    type Target = Regex;
    fn deref(&self) -> &Regex {
        &self.0
    }
}

impl From<Regex> for WrappedRegex {
    fn from(other: Regex) -> WrappedRegex {
        WrappedRegex(other)
    }
}

/// Record filter understood by every [`RecordSource`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    /// Match everything. This is the "empty" filter: it never activates search mode.
    Any,
    IdIn(Vec<RecordId>),
    /// Records whose parent reference (normalized) is one of `ids`.
    ParentIn {
        field: String,
        ids: Vec<RecordId>,
    },
    FieldEq(String, JsonValue),
    /// Records whose `field` renders to text matching the regex.
    NameMatches {
        field: String,
        regex: WrappedRegex,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

/// `serde_json::Value` wrapper with the `Eq + Hash` a [`Filter`] needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonValue(pub Value);

impl Eq for JsonValue {}

impl Hash for JsonValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_string().hash(state);
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        JsonValue(value)
    }
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::Any)
    }

    pub fn name_matches(field: &str, text: &str) -> Result<Filter, MindmapError> {
        Ok(Filter::NameMatches {
            field: field.to_string(),
            regex: WrappedRegex::try_from(text)?,
        })
    }

    pub fn parent_in(field: &str, ids: Vec<RecordId>) -> Filter {
        Filter::ParentIn {
            field: field.to_string(),
            ids,
        }
    }

    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter::Or(Box::new(self), Box::new(other))
    }

    pub fn match_record(&self, record: &Record) -> bool {
        match self {
            Filter::Any => true,
            Filter::IdIn(ids) => ids.contains(&record.id),
            Filter::ParentIn { field, ids } => record
                .parent_id(field)
                .filter(|parent| ids.contains(parent))
                .is_some(),
            Filter::FieldEq(field, value) => {
                if field == "id" {
                    return RecordId::from_reference(&value.0) == Some(record.id);
                }
                record.get(field) == Some(&value.0)
            }
            Filter::NameMatches { field, regex } => match record.get(field) {
                Some(Value::String(text)) => regex.is_match(text),
                Some(Value::Null) | None => false,
                Some(other) => regex.is_match(&other.to_string()),
            },
            Filter::And(lhs, rhs) => lhs.match_record(record) && rhs.match_record(record),
            Filter::Or(lhs, rhs) => lhs.match_record(record) || rhs.match_record(record),
        }
    }
}

/// Result of an ancestor-inclusive filter resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorSet {
    /// Ids matched by the filter itself.
    pub matched: BTreeSet<RecordId>,
    /// `matched` plus every ancestor reachable through parent references.
    pub all: BTreeSet<RecordId>,
}

/// One labelled value of a node's hover card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardField {
    pub name: String,
    pub label: String,
    pub value: Value,
}

/// The remote data service backing a mindmap. Implementations own the actual query, fetch, and
/// delete mechanics; the engine only consumes them.
pub trait RecordSource: Sync {
    fn search_by_filter(
        &self,
        model: &str,
        filter: &Filter,
        fields: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Record>, MindmapError>> + Send;

    fn fetch_by_ids(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Record>, MindmapError>> + Send;

    fn delete_by_id(
        &self,
        model: &str,
        ids: &[RecordId],
    ) -> impl std::future::Future<Output = Result<(), MindmapError>> + Send;

    /// Secondary per-node data shown on hover.
    /// Default implementation returns no fields.
    fn fetch_card_data(
        &self,
        _model: &str,
        _id: RecordId,
    ) -> impl std::future::Future<Output = Result<Vec<CardField>, MindmapError>> + Send {
        tracing::warn!("This RecordSource impl does not have a fetch_card_data implementation!");
        async { Ok(Vec::new()) }
    }

    /// Resolve `filter` to its ancestor-inclusive id set.
    ///
    /// Matches the filter, then keeps fetching the parents of the newest level until no unseen
    /// parent id remains, so every match stays reachable from a root.
    #[tracing::instrument(skip(self))]
    fn resolve_ancestors<'a>(
        &'a self,
        model: &'a str,
        filter: &'a Filter,
        parent_field: &'a str,
    ) -> impl std::future::Future<Output = Result<AncestorSet, MindmapError>> + Send + 'a {
        async move {
            let fields = vec![parent_field.to_string()];
            let matches = self.search_by_filter(model, filter, &fields).await?;
            let matched: BTreeSet<RecordId> = matches.iter().map(|r| r.id).collect();
            let mut all = matched.clone();

            let mut level: Vec<RecordId> = matches
                .iter()
                .filter_map(|r| r.parent_id(parent_field))
                .filter(|id| !all.contains(id))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let mut loop_iter = 0;
            while !level.is_empty() {
                if loop_iter >= MAX_ANCESTOR_TRAVERSAL {
                    tracing::warn!(
                        "Cutting off ancestor resolution after {} levels",
                        MAX_ANCESTOR_TRAVERSAL
                    );
                    break;
                }
                loop_iter += 1;
                let parents = self.fetch_by_ids(model, &level, &fields).await?;
                for parent in parents.iter() {
                    all.insert(parent.id);
                }
                level = parents
                    .iter()
                    .filter_map(|p| p.parent_id(parent_field))
                    .filter(|id| !all.contains(id))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
            }
            Ok(AncestorSet { matched, all })
        }
    }
}
