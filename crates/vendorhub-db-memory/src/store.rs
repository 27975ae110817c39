use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use vendorhub_storage::{
    Document, DocumentStore, FindResult, Query, StorageError, document_id,
};

pub type StorageKey = String; // Format: "collection/id"

fn make_storage_key(collection: &str, id: &str) -> StorageKey {
    format!("{collection}/{id}")
}

fn extract_id(doc: &Document) -> Result<String, StorageError> {
    if !doc.is_object() {
        return Err(StorageError::invalid_document("document must be a JSON object"));
    }
    document_id(doc)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| StorageError::invalid_document("missing string id"))
}

/// In-memory document store on a papaya lock-free HashMap.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: PapayaHashMap<StorageKey, Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across every collection.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collection_snapshot(&self, collection: &str) -> Vec<Document> {
        let prefix = format!("{collection}/");
        self.data
            .pin()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StorageError> {
        let id = extract_id(&doc)?;
        let key = make_storage_key(collection, &id);
        let guard = self.data.pin();
        match guard.try_insert(key, doc) {
            Ok(stored) => Ok(stored.clone()),
            Err(_) => Err(StorageError::already_exists(collection, id)),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let key = make_storage_key(collection, id);
        Ok(self.data.pin().get(&key).cloned())
    }

    async fn replace(&self, collection: &str, doc: Document) -> Result<Document, StorageError> {
        let id = extract_id(&doc)?;
        let key = make_storage_key(collection, &id);
        let guard = self.data.pin();
        if guard.get(&key).is_none() {
            return Err(StorageError::not_found(collection, id));
        }
        guard.insert(key, doc.clone());
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let key = make_storage_key(collection, id);
        Ok(self.data.pin().remove(&key).is_some())
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<FindResult, StorageError> {
        let docs = self.collection_snapshot(collection);
        let scanned = docs.len();
        let result = query.apply(docs);
        tracing::trace!(collection, scanned, matched = result.total, "memory find");
        Ok(result)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_get_replace_delete() {
        let store = InMemoryStore::new();
        store
            .insert("buses", json!({"id": "b1", "capacity": 40}))
            .await
            .unwrap();
        let got = store.get("buses", "b1").await.unwrap().unwrap();
        assert_eq!(got["capacity"], 40);

        store
            .replace("buses", json!({"id": "b1", "capacity": 50}))
            .await
            .unwrap();
        assert_eq!(store.get("buses", "b1").await.unwrap().unwrap()["capacity"], 50);

        assert!(store.delete("buses", "b1").await.unwrap());
        assert!(!store.delete("buses", "b1").await.unwrap());
        assert!(store.get("buses", "b1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_conflict() {
        let store = InMemoryStore::new();
        store.insert("routes", json!({"id": "r1"})).await.unwrap();
        let err = store.insert("routes", json!({"id": "r1"})).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn replace_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.replace("routes", json!({"id": "nope"})).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn documents_need_an_id() {
        let store = InMemoryStore::new();
        assert!(store.insert("routes", json!({"name": "x"})).await.is_err());
        assert!(store.insert("routes", json!(["id"])).await.is_err());
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = InMemoryStore::new();
        store.insert("buses", json!({"id": "1"})).await.unwrap();
        store.insert("routes", json!({"id": "1"})).await.unwrap();
        store.insert("routes", json!({"id": "2"})).await.unwrap();
        let found = store.find("routes", &Query::new()).await.unwrap();
        assert_eq!(found.total, 2);
        assert_eq!(store.count("buses", &Query::new()).await.unwrap(), 1);
        assert_eq!(store.len(), 3);
    }
}
