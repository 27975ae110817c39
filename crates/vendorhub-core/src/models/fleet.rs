//! Buses owned by a tenant.

use serde::{Deserialize, Serialize};

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::{impl_entity, string_enum};

string_enum! {
    pub enum BusStatus ("bus status") {
        Active => "active",
        Maintenance => "maintenance",
        Retired => "retired",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Unique within the tenant.
    pub registration_number: String,
    pub model: String,
    pub capacity: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub status: BusStatus,
}

impl_entity!(Bus, "buses");

impl Bus {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CoreError::invalid_field("capacity", "must be greater than 0"));
        }
        Ok(())
    }

    /// Registration numbers compare case- and whitespace-insensitively.
    pub fn normalize_registration(value: &str) -> String {
        value
            .split_whitespace()
            .collect::<String>()
            .to_ascii_uppercase()
    }

    pub fn is_dispatchable(&self) -> bool {
        self.status == BusStatus::Active
    }
}
