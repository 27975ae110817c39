//! Tenant employees.

use serde::{Deserialize, Serialize};

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::{impl_entity, string_enum};

string_enum! {
    pub enum StaffRole ("staff role") {
        Driver => "driver",
        Conductor => "conductor",
        Manager => "manager",
        Pharmacist => "pharmacist",
        Receptionist => "receptionist",
        Cashier => "cashier",
        Other => "other",
    }
}

string_enum! {
    pub enum StaffStatus ("staff status") {
        Active => "active",
        Inactive => "inactive",
        OnLeave => "on_leave",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub phone: String,
    pub role: StaffRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    pub status: StaffStatus,
    #[serde(default, with = "crate::time::iso_date::option")]
    pub hired_at: Option<time::Date>,
}

impl_entity!(StaffMember, "staff");

impl StaffMember {
    pub fn validate(&self) -> Result<()> {
        if self.role == StaffRole::Driver
            && self
                .license_number
                .as_deref()
                .is_none_or(|l| l.trim().is_empty())
        {
            return Err(CoreError::missing_fields(["licenseNumber"]));
        }
        Ok(())
    }

    /// Whether the member can be assigned to `role` on a dispatch.
    pub fn can_serve_as(&self, role: StaffRole) -> bool {
        self.status == StaffStatus::Active && self.role == role
    }
}
