//! Licences, insurance and inspection documents with expiry tracking.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::time::days_between;
use crate::{impl_entity, string_enum};

/// Documents expiring within this many days are flagged.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

string_enum! {
    pub enum DocumentType ("document type") {
        License => "license",
        Insurance => "insurance",
        Inspection => "inspection",
        Permit => "permit",
        Other => "other",
    }
}

string_enum! {
    pub enum ComplianceStatus ("compliance status") {
        Valid => "valid",
        ExpiringSoon => "expiring_soon",
        Expired => "expired",
    }
}

impl ComplianceStatus {
    pub fn on(expires_at: Option<Date>, today: Date) -> Self {
        match expires_at.map(|e| days_between(today, e)) {
            Some(days) if days < 0 => Self::Expired,
            Some(days) if days <= EXPIRY_WARNING_DAYS => Self::ExpiringSoon,
            _ => Self::Valid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRecord {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub document_type: DocumentType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    /// Record the document covers, e.g. a bus id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(with = "crate::time::iso_date")]
    pub issued_at: Date,
    #[serde(default, with = "crate::time::iso_date::option")]
    pub expires_at: Option<Date>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Derived from `expiresAt`; recomputed on every read.
    #[serde(default = "default_status")]
    pub status: ComplianceStatus,
}

fn default_status() -> ComplianceStatus {
    ComplianceStatus::Valid
}

impl_entity!(ComplianceRecord, "compliance");

impl ComplianceRecord {
    pub fn validate(&self) -> Result<()> {
        if let Some(expires) = self.expires_at
            && expires < self.issued_at
        {
            return Err(CoreError::invalid_field(
                "expiresAt",
                "must not be before issuedAt",
            ));
        }
        Ok(())
    }

    pub fn refresh_status(&mut self, today: Date) -> ComplianceStatus {
        self.status = ComplianceStatus::on(self.expires_at, today);
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn status_from_expiry() {
        let today = date!(2026 - 06 - 01);
        assert_eq!(ComplianceStatus::on(None, today), ComplianceStatus::Valid);
        assert_eq!(
            ComplianceStatus::on(Some(date!(2026 - 05 - 31)), today),
            ComplianceStatus::Expired
        );
        assert_eq!(
            ComplianceStatus::on(Some(today), today),
            ComplianceStatus::ExpiringSoon
        );
        assert_eq!(
            ComplianceStatus::on(Some(date!(2026 - 07 - 01)), today),
            ComplianceStatus::ExpiringSoon
        );
        assert_eq!(
            ComplianceStatus::on(Some(date!(2026 - 07 - 02)), today),
            ComplianceStatus::Valid
        );
    }

    #[test]
    fn expiry_before_issue_rejected() {
        let mut rec = ComplianceRecord {
            meta: RecordMeta::for_vendor("v1"),
            document_type: DocumentType::Insurance,
            title: "Fleet cover".into(),
            document_number: None,
            entity_id: None,
            issued_at: date!(2026 - 01 - 10),
            expires_at: Some(date!(2025 - 12 - 31)),
            notes: None,
            status: ComplianceStatus::Valid,
        };
        assert!(rec.validate().is_err());
        rec.expires_at = Some(date!(2027 - 01 - 10));
        assert!(rec.validate().is_ok());
        assert_eq!(rec.refresh_status(date!(2026 - 12 - 20)), ComplianceStatus::ExpiringSoon);
    }

    #[test]
    fn dates_serialize_as_plain_days() {
        let rec = ComplianceRecord {
            meta: RecordMeta::for_vendor("v1"),
            document_type: DocumentType::Permit,
            title: "Route permit".into(),
            document_number: Some("RP-7".into()),
            entity_id: None,
            issued_at: date!(2026 - 02 - 01),
            expires_at: None,
            notes: None,
            status: ComplianceStatus::Valid,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["issuedAt"], "2026-02-01");
        assert!(json["expiresAt"].is_null());
        assert_eq!(json["documentType"], "permit");
    }
}
