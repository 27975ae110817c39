//! Typed access to one collection, scoped to a tenant.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use vendorhub_core::Entity;

use crate::error::StorageError;
use crate::query::Query;
use crate::{Document, DynStore};

/// Which records a repository may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Only records whose `vendorId` equals the given id.
    Tenant(String),
    /// Every record. Used for platform administration.
    Platform,
}

impl Scope {
    pub fn tenant(vendor_id: impl Into<String>) -> Self {
        Self::Tenant(vendor_id.into())
    }

    pub fn vendor_id(&self) -> Option<&str> {
        match self {
            Self::Tenant(id) => Some(id),
            Self::Platform => None,
        }
    }

    fn admits(&self, doc: &Document) -> bool {
        match self {
            Self::Tenant(id) => doc.get("vendorId").and_then(|v| v.as_str()) == Some(id.as_str()),
            Self::Platform => true,
        }
    }

    fn restrict(&self, query: Query) -> Query {
        match self {
            Self::Tenant(id) => query.eq("vendorId", id.as_str()),
            Self::Platform => query,
        }
    }
}

/// Typed repository over the collection of `T`.
///
/// Records outside the scope behave exactly like missing records.
pub struct Repository<T> {
    store: DynStore,
    scope: Scope,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scope: self.scope.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: Entity + Serialize + DeserializeOwned,
{
    pub fn new(store: DynStore, scope: Scope) -> Self {
        Self {
            store,
            scope,
            _entity: PhantomData,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn encode(entity: &T) -> Result<Document, StorageError> {
        Ok(serde_json::to_value(entity)?)
    }

    fn decode(doc: Document) -> Result<T, StorageError> {
        serde_json::from_value(doc).map_err(|e| {
            StorageError::internal(format!("stored {} document is unreadable: {e}", T::COLLECTION))
        })
    }

    fn check_owner(&self, entity: &T) -> Result<(), StorageError> {
        match self.scope.vendor_id() {
            Some(vendor) if entity.vendor_id() != Some(vendor) => Err(
                StorageError::invalid_document(format!(
                    "{} record does not belong to tenant {vendor}",
                    T::COLLECTION
                )),
            ),
            _ => Ok(()),
        }
    }

    pub async fn insert(&self, entity: &T) -> Result<T, StorageError> {
        self.check_owner(entity)?;
        let stored = self.store.insert(T::COLLECTION, Self::encode(entity)?).await?;
        tracing::debug!(collection = T::COLLECTION, id = entity.id(), "inserted");
        Self::decode(stored)
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) if self.scope.admits(&doc) => Self::decode(doc).map(Some),
            _ => Ok(None),
        }
    }

    /// Like [`get`](Self::get) but a missing record is `StorageError::NotFound`.
    pub async fn require(&self, id: &str) -> Result<T, StorageError> {
        self.get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(T::COLLECTION, id))
    }

    /// Stamp `updatedAt` and persist.
    pub async fn update(&self, entity: &mut T) -> Result<(), StorageError> {
        self.check_owner(entity)?;
        if self.get(entity.id()).await?.is_none() {
            return Err(StorageError::not_found(T::COLLECTION, entity.id()));
        }
        entity.touch();
        self.store
            .replace(T::COLLECTION, Self::encode(entity)?)
            .await?;
        Ok(())
    }

    /// Delete by id. Returns `false` when nothing in scope had that id.
    pub async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        if self.get(id).await?.is_none() {
            return Ok(false);
        }
        let removed = self.store.delete(T::COLLECTION, id).await?;
        if removed {
            tracing::debug!(collection = T::COLLECTION, id, "deleted");
        }
        Ok(removed)
    }

    /// One page of matches plus the total match count.
    pub async fn find(&self, query: Query) -> Result<(Vec<T>, u64), StorageError> {
        let query = self.scope.restrict(query);
        let result = self.store.find(T::COLLECTION, &query).await?;
        let items = result
            .documents
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, result.total))
    }

    /// Every match, ignoring any window on `query`.
    pub async fn find_all(&self, query: Query) -> Result<Vec<T>, StorageError> {
        Ok(self.find(query.unbounded()).await?.0)
    }

    pub async fn find_one(&self, query: Query) -> Result<Option<T>, StorageError> {
        let (mut items, _) = self.find(query.window(0, 1)).await?;
        Ok(items.pop())
    }

    pub async fn count(&self, query: Query) -> Result<u64, StorageError> {
        self.store
            .count(T::COLLECTION, &self.scope.restrict(query))
            .await
    }
}
