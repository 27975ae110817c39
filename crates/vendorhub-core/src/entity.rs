//! Common record metadata shared by every stored entity.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::id::generate_id;

/// Identity, tenant and timestamps of a stored record.
///
/// Flattened into each entity so the stored JSON stays a single flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub id: String,
    /// Owning tenant. `None` only for platform-level records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RecordMeta {
    /// Fresh metadata for a tenant-owned record.
    pub fn for_vendor(vendor_id: impl Into<String>) -> Self {
        Self::build(generate_id(), Some(vendor_id.into()))
    }

    /// Fresh metadata for a platform-level record.
    pub fn platform() -> Self {
        Self::build(generate_id(), None)
    }

    /// Metadata with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, vendor_id: Option<String>) -> Self {
        Self::build(id.into(), vendor_id)
    }

    fn build(id: String, vendor_id: Option<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            vendor_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A record stored in a named collection.
pub trait Entity {
    /// Collection the entity lives in.
    const COLLECTION: &'static str;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn vendor_id(&self) -> Option<&str> {
        self.meta().vendor_id.as_deref()
    }

    /// Mark the record as modified now.
    fn touch(&mut self) {
        self.meta_mut().updated_at = OffsetDateTime::now_utc();
    }
}

/// Implements [`Entity`] for a struct with a flattened `meta: RecordMeta`.
#[macro_export]
macro_rules! impl_entity {
    ($ty:ty, $collection:literal) => {
        impl $crate::entity::Entity for $ty {
            const COLLECTION: &'static str = $collection;

            fn meta(&self) -> &$crate::entity::RecordMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::entity::RecordMeta {
                &mut self.meta
            }
        }
    };
}
