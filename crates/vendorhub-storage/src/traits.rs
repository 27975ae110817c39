//! The backend contract.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::query::{FindResult, Query};
use crate::Document;

/// A collection-oriented JSON document store.
///
/// Implementations must be thread-safe. Documents are JSON objects whose
/// string `id` is unique within their collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the id is taken and
    /// `StorageError::InvalidDocument` if the document has no string `id`.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StorageError>;

    /// Read a document by id. Missing documents are `Ok(None)`.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError>;

    /// Replace an existing document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no document has that id.
    async fn replace(&self, collection: &str, doc: Document) -> Result<Document, StorageError>;

    /// Delete a document. Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError>;

    /// Filter, sort and window a collection.
    async fn find(&self, collection: &str, query: &Query) -> Result<FindResult, StorageError>;

    /// Number of documents matching `query`, ignoring its window.
    async fn count(&self, collection: &str, query: &Query) -> Result<u64, StorageError> {
        let unbounded = query.clone().unbounded();
        Ok(self.find(collection, &unbounded).await?.total)
    }

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}
