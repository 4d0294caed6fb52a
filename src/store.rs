//! In-memory [`RecordSource`] implementation.
//!
//! [`RecordStore`] keeps records per model in insertion order behind a [`parking_lot::RwLock`], so
//! it can be shared between an engine and the code that mutates it. It backs the CLI and the test
//! suite, and doubles as a reference for what a remote implementation must provide.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use parking_lot::RwLock;
use serde_json::Value;

use crate::{
    properties::{Record, RecordId},
    query::{CardField, Filter, RecordSource},
    MindmapError,
};

#[derive(Debug, Default, Clone)]
struct ModelTable {
    /// Insertion order is the order query results come back in.
    order: Vec<RecordId>,
    records: BTreeMap<RecordId, Record>,
    /// (field, label) pairs shown on hover cards.
    card_template: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    models: Arc<RwLock<BTreeMap<String, ModelTable>>>,
}

impl RecordStore {
    pub fn new() -> Self {
        RecordStore::default()
    }

    /// Build a store for one model from a JSON array of record objects.
    pub fn from_json(model: &str, content: &str) -> Result<Self, MindmapError> {
        let records: Vec<Record> = serde_json::from_str(content)?;
        let store = RecordStore::new();
        store.insert_all(model, records);
        Ok(store)
    }

    pub fn from_json_file<P: AsRef<Path>>(model: &str, path: P) -> Result<Self, MindmapError> {
        tracing::debug!("Reading records from {:?}", path.as_ref());
        let content = std::fs::read_to_string(path)?;
        RecordStore::from_json(model, &content)
    }

    /// Insert or replace a record. Replacing keeps the record's original position.
    pub fn insert(&self, model: &str, record: Record) {
        let mut models = self.models.write();
        let table = models.entry(model.to_string()).or_default();
        if !table.records.contains_key(&record.id) {
            table.order.push(record.id);
        }
        table.records.insert(record.id, record);
    }

    pub fn insert_all<I: IntoIterator<Item = Record>>(&self, model: &str, records: I) {
        for record in records {
            self.insert(model, record);
        }
    }

    pub fn get(&self, model: &str, id: RecordId) -> Option<Record> {
        self.models
            .read()
            .get(model)
            .and_then(|table| table.records.get(&id).cloned())
    }

    pub fn len(&self, model: &str) -> usize {
        self.models
            .read()
            .get(model)
            .map(|table| table.records.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, model: &str) -> bool {
        self.len(model) == 0
    }

    pub fn set_card_template(&self, model: &str, fields: Vec<(String, String)>) {
        let mut models = self.models.write();
        models.entry(model.to_string()).or_default().card_template = fields;
    }

    fn select<F>(&self, model: &str, fields: &[String], pred: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let models = self.models.read();
        let Some(table) = models.get(model) else {
            return Vec::new();
        };
        table
            .order
            .iter()
            .filter_map(|id| table.records.get(id))
            .filter(|record| pred(record))
            .map(|record| record.project(fields))
            .collect()
    }
}

/// Render a card value the way a form would display it: `[id, label]` references show their label,
/// empty values show as an empty string.
fn card_value(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Array(pair)) if pair.len() == 2 => pair[1].clone(),
        Some(Value::Object(obj)) => obj
            .get("display_name")
            .or_else(|| obj.get("name"))
            .cloned()
            .unwrap_or(Value::String(String::new())),
        Some(Value::Bool(false)) | Some(Value::Null) | None => Value::String(String::new()),
        Some(other) => other.clone(),
    }
}

impl RecordSource for RecordStore {
    async fn search_by_filter(
        &self,
        model: &str,
        filter: &Filter,
        fields: &[String],
    ) -> Result<Vec<Record>, MindmapError> {
        Ok(self.select(model, fields, |record| filter.match_record(record)))
    }

    async fn fetch_by_ids(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[String],
    ) -> Result<Vec<Record>, MindmapError> {
        Ok(self.select(model, fields, |record| ids.contains(&record.id)))
    }

    async fn delete_by_id(&self, model: &str, ids: &[RecordId]) -> Result<(), MindmapError> {
        let mut models = self.models.write();
        let table = models
            .get_mut(model)
            .ok_or_else(|| MindmapError::NotFound(format!("model '{model}'")))?;
        if let Some(missing) = ids.iter().find(|id| !table.records.contains_key(id)) {
            return Err(MindmapError::NotFound(format!("{model}({missing})")));
        }
        for id in ids.iter() {
            table.records.remove(id);
        }
        table.order.retain(|id| !ids.contains(id));
        Ok(())
    }

    async fn fetch_card_data(
        &self,
        model: &str,
        id: RecordId,
    ) -> Result<Vec<CardField>, MindmapError> {
        let models = self.models.read();
        let table = models
            .get(model)
            .ok_or_else(|| MindmapError::NotFound(format!("model '{model}'")))?;
        let record = table
            .records
            .get(&id)
            .ok_or_else(|| MindmapError::NotFound(format!("{model}({id})")))?;
        Ok(table
            .card_template
            .iter()
            .map(|(name, label)| CardField {
                name: name.clone(),
                label: label.clone(),
                value: card_value(record.get(name)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_log::test;

    const MODEL: &str = "project.task";

    fn sample_store() -> RecordStore {
        RecordStore::from_json(
            MODEL,
            r#"[
                {"id": 1, "display_name": "Launch", "parent_id": false, "user_id": [7, "Ada"]},
                {"id": 2, "display_name": "Design", "parent_id": [1, "Launch"]},
                {"id": 3, "display_name": "Build", "parent_id": [1, "Launch"]},
                {"id": 4, "display_name": "Build CI", "parent_id": {"id": 3}}
            ]"#,
        )
        .unwrap()
    }

    #[test(tokio::test)]
    async fn test_search_preserves_insertion_order_and_projects() {
        let store = sample_store();
        let children = store
            .search_by_filter(
                MODEL,
                &Filter::parent_in("parent_id", vec![RecordId(1), RecordId(3)]),
                &["display_name".to_string()],
            )
            .await
            .unwrap();
        let ids: Vec<i64> = children.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert!(children.iter().all(|r| r.get("parent_id").is_none()));
    }

    #[test(tokio::test)]
    async fn test_delete_missing_record_is_an_error() {
        let store = sample_store();
        let result = store.delete_by_id(MODEL, &[RecordId(2), RecordId(99)]).await;
        assert!(matches!(result, Err(MindmapError::NotFound(_))));
        assert_eq!(store.len(MODEL), 4);

        store.delete_by_id(MODEL, &[RecordId(2)]).await.unwrap();
        assert_eq!(store.len(MODEL), 3);
        assert!(store.get(MODEL, RecordId(2)).is_none());
    }

    #[test(tokio::test)]
    async fn test_card_data_formats_references() {
        let store = sample_store();
        store.set_card_template(
            MODEL,
            vec![
                ("user_id".to_string(), "Assignee".to_string()),
                ("deadline".to_string(), "Deadline".to_string()),
            ],
        );
        let card = store.fetch_card_data(MODEL, RecordId(1)).await.unwrap();
        assert_eq!(card.len(), 2);
        assert_eq!(card[0].label, "Assignee");
        assert_eq!(card[0].value, json!("Ada"));
        assert_eq!(card[1].value, json!(""));
    }

    #[test(tokio::test)]
    async fn test_resolve_ancestors_walks_to_roots() {
        let store = sample_store();
        let set = store
            .resolve_ancestors(MODEL, &Filter::name_matches("display_name", "CI").unwrap(), "parent_id")
            .await
            .unwrap();
        assert_eq!(set.matched.iter().map(|id| id.0).collect::<Vec<_>>(), vec![4]);
        assert_eq!(set.all.iter().map(|id| id.0).collect::<Vec<_>>(), vec![1, 3, 4]);
    }
}
