//! In-memory document storage for VendorHub.
//!
//! The default backend for development and tests. Data lives for the life of
//! the process.
//!
//! # Example
//!
//! ```ignore
//! use vendorhub_db_memory::InMemoryStore;
//! use vendorhub_storage::DocumentStore;
//!
//! let store = InMemoryStore::new();
//! store.insert("buses", serde_json::json!({"id": "b1", "capacity": 40})).await?;
//! ```

mod store;

pub use store::{InMemoryStore, StorageKey};

/// Creates a shareable in-memory store.
pub fn create_store() -> vendorhub_storage::DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}
