//! Pharmacy prescriptions.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::lifecycle::Lifecycle;
use crate::{impl_entity, string_enum};

string_enum! {
    pub enum PrescriptionStatus ("prescription status") {
        Pending => "pending",
        Verified => "verified",
        Dispensed => "dispensed",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

impl Lifecycle for PrescriptionStatus {
    const ENTITY: &'static str = "prescription";

    fn allowed_next(&self) -> &'static [Self] {
        use PrescriptionStatus::*;
        match self {
            Pending => &[Verified, Rejected, Cancelled],
            Verified => &[Dispensed, Rejected],
            Dispensed | Rejected | Cancelled => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub patient_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_phone: Option<String>,
    pub doctor_name: String,
    pub medications: Vec<Medication>,
    pub status: PrescriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub dispensed_at: Option<OffsetDateTime>,
}

impl_entity!(Prescription, "prescriptions");

impl Prescription {
    pub fn validate(&self) -> Result<()> {
        if self.medications.is_empty() {
            return Err(CoreError::missing_fields(["medications"]));
        }
        for (i, med) in self.medications.iter().enumerate() {
            if med.name.trim().is_empty() {
                return Err(CoreError::missing_fields([format!("medications[{i}].name")]));
            }
            if med.quantity == 0 {
                return Err(CoreError::invalid_field(
                    format!("medications[{i}].quantity"),
                    "must be greater than 0",
                ));
            }
        }
        Ok(())
    }

    pub fn change_status(&mut self, next: PrescriptionStatus, reason: Option<String>) -> Result<()> {
        self.status = self.status.transition_to(next)?;
        match next {
            PrescriptionStatus::Dispensed => self.dispensed_at = Some(OffsetDateTime::now_utc()),
            PrescriptionStatus::Rejected => self.rejection_reason = reason,
            _ => {}
        }
        Ok(())
    }

    /// Only prescriptions that never reached the counter may be deleted.
    pub fn is_deletable(&self) -> bool {
        matches!(
            self.status,
            PrescriptionStatus::Pending | PrescriptionStatus::Cancelled
        )
    }
}
