//! Vendor (tenant) accounts.

use serde::{Deserialize, Serialize};

use crate::entity::RecordMeta;
use crate::impl_entity;
use crate::tenant::ServiceType;

/// A business account. Every tenant-owned record carries its id as `vendorId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub service_type: ServiceType,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl_entity!(Vendor, "vendors");

impl Vendor {
    pub fn new(name: impl Into<String>, service_type: ServiceType, email: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::platform(),
            name: name.into(),
            service_type,
            email: email.into(),
            phone: None,
            active: true,
        }
    }
}
