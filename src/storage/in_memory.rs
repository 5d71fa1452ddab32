//! In-memory implementation of Store for testing and development

use crate::core::attributes::{Document, get_path, set_path};
use crate::core::descriptor::UniqueIndex;
use crate::core::query::{Filter, FindOptions, Page};
use crate::core::record::ID_KEY;
use crate::core::store::{Store, StoreError, StoreResult};
use anyhow::anyhow;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Collection {
    documents: IndexMap<String, Document>,
    indexes: Vec<UniqueIndex>,
}

impl Collection {
    /// Name of the first unique index `candidate` would violate
    fn conflicting_index(&self, candidate: &Document, own_id: Option<&str>) -> Option<String> {
        self.indexes.iter().find_map(|index| {
            let key = index_key(index, candidate);
            self.documents
                .iter()
                .filter(|(id, _)| Some(id.as_str()) != own_id)
                .any(|(_, other)| index_key(index, other) == key)
                .then(|| index.name.clone())
        })
    }
}

/// Indexed values of a document; missing keys count as null
fn index_key(index: &UniqueIndex, document: &Document) -> Vec<Value> {
    index
        .keys
        .iter()
        .map(|key| get_path(document, key).cloned().unwrap_or(Value::Null))
        .collect()
}

/// In-memory document store
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
/// Documents keep their insertion order and identities are UUID-v4 strings.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored in `collection`
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let collections = self
            .collections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(collections
            .get(collection)
            .map_or(0, |c| c.documents.len()))
    }

    /// Drop every collection, keeping declared indexes
    pub fn clear(&self) -> StoreResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        for collection in collections.values_mut() {
            collection.documents.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save(&self, collection: &str, mut document: Document) -> StoreResult<Document> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let target = collections.entry(collection.to_string()).or_default();

        if let Some(index) = target.conflicting_index(&document, None) {
            return Err(StoreError::DuplicateKey { index });
        }

        let id = Uuid::new_v4().simple().to_string();
        document.insert(ID_KEY.to_string(), Value::String(id.clone()));
        target.documents.insert(id, document.clone());

        Ok(document)
    }

    async fn update(&self, collection: &str, id: &str, changes: Document) -> StoreResult<u64> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let Some(current) = target.documents.get(id) else {
            return Ok(0);
        };

        let mut updated = current.clone();
        for (path, value) in changes {
            set_path(&mut updated, &path, value);
        }

        if let Some(index) = target.conflicting_index(&updated, Some(id)) {
            return Err(StoreError::DuplicateKey { index });
        }

        target.documents.insert(id.to_string(), updated);
        Ok(1)
    }

    async fn find(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let collections = self
            .collections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.get(id))
            .cloned())
    }

    async fn find_where(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Page> {
        let collections = self
            .collections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        let Some(source) = collections.get(collection) else {
            return Ok(Page::default());
        };

        let mut matching: Vec<&Document> = source
            .documents
            .values()
            .filter(|document| filter.matches(document))
            .collect();
        if let Some(sort) = &options.sort {
            matching.sort_by(|a, b| sort.compare(a, b));
        }

        let total = matching.len();
        let records = matching
            .into_iter()
            .skip(options.skip())
            .take(options.page_size().unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(Page {
            records,
            has_next_page: options.has_next_page(total),
        })
    }

    async fn exists(&self, collection: &str, filter: &Filter) -> StoreResult<bool> {
        let collections = self
            .collections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(collections
            .get(collection)
            .is_some_and(|c| c.documents.values().any(|d| filter.matches(d))))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<u64> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let removed = collections
            .get_mut(collection)
            .and_then(|c| c.documents.shift_remove(id));
        Ok(u64::from(removed.is_some()))
    }

    async fn ensure_unique_index(&self, collection: &str, index: &UniqueIndex) -> StoreResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        let target = collections.entry(collection.to_string()).or_default();

        if !target.indexes.iter().any(|existing| existing.name == index.name) {
            target.indexes.push(index.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attributes::document;
    use crate::core::query::Sort;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_assigns_simple_uuid() {
        let store = InMemoryStore::new();
        let saved = store
            .save("users", document(json!({"name": "wow"})))
            .await
            .unwrap();

        let id = saved[ID_KEY].as_str().unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(saved["name"], json!("wow"));
        assert_eq!(store.count("users").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_sets_dotted_paths_and_keeps_siblings() {
        let store = InMemoryStore::new();
        let saved = store
            .save("fake", document(json!({"options": {"hey": "a", "now": "b"}})))
            .await
            .unwrap();
        let id = saved[ID_KEY].as_str().unwrap();

        let matched = store
            .update("fake", id, document(json!({"options.hey": "z"})))
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let found = store.find("fake", id).await.unwrap().unwrap();
        assert_eq!(found["options"], json!({"hey": "z", "now": "b"}));
    }

    #[tokio::test]
    async fn test_update_unknown_id_matches_nothing() {
        let store = InMemoryStore::new();
        let matched = store
            .update("fake", "nope", document(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn test_missing_keys_collide_as_null() {
        let store = InMemoryStore::new();
        store
            .ensure_unique_index("users", &UniqueIndex::on("users", "email"))
            .await
            .unwrap();
        store.save("users", document(json!({}))).await.unwrap();

        let err = store.save("users", document(json!({}))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { index } if index == "users.email"));
    }

    #[tokio::test]
    async fn test_find_where_sorts_and_paginates() {
        let store = InMemoryStore::new();
        for n in [3, 1, 2] {
            store.save("nums", document(json!({"n": n}))).await.unwrap();
        }

        let options = FindOptions::new().limit(2).sort(Sort::desc("n"));
        let page = store.find_where("nums", &Filter::All, &options).await.unwrap();
        let values: Vec<_> = page.records.iter().map(|d| d["n"].clone()).collect();
        assert_eq!(values, vec![json!(3), json!(2)]);
        assert!(page.has_next_page);

        let page = store
            .find_where("nums", &Filter::All, &options.page(2))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_delete_reports_count() {
        let store = InMemoryStore::new();
        let saved = store.save("x", document(json!({}))).await.unwrap();
        let id = saved[ID_KEY].as_str().unwrap();

        assert_eq!(store.delete("x", id).await.unwrap(), 1);
        assert_eq!(store.delete("x", id).await.unwrap(), 0);
        assert!(!store.exists("x", &Filter::All).await.unwrap());
    }
}
