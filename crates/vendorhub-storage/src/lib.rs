//! # vendorhub-storage
//!
//! Storage abstraction for VendorHub.
//!
//! Records are JSON documents grouped in named collections. Backends implement
//! [`DocumentStore`]; handlers use the typed, tenant-scoped [`Repository`].
//!
//! ```ignore
//! use vendorhub_storage::{Query, Repository, Scope};
//! use vendorhub_core::models::Bus;
//!
//! let buses = Repository::<Bus>::new(store.clone(), Scope::tenant("v-1"));
//! let active = buses.find_all(Query::new().eq("status", "active")).await?;
//! ```

mod error;
pub mod query;
mod repository;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use query::{Filter, FilterOp, FindResult, Query, Search, Sort};
pub use repository::{Repository, Scope};
pub use traits::DocumentStore;

/// A stored record: a JSON object with at least an `id` field.
pub type Document = serde_json::Value;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStore = std::sync::Arc<dyn DocumentStore>;

/// Id of a document, if it carries a string `id`.
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(|v| v.as_str())
}
