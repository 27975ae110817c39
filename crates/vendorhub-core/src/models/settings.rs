//! Per-tenant settings. Stored as one document whose id is the vendor id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::RecordMeta;
use crate::impl_entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub email: bool,
    pub sms: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSettings {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl_entity!(VendorSettings, "settings");

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub business_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    pub notifications: Option<NotificationSettings>,
    pub preferences: Option<Map<String, Value>>,
}

impl VendorSettings {
    /// Settings a tenant sees before saving anything.
    pub fn defaults_for(vendor_id: &str) -> Self {
        Self {
            meta: RecordMeta::with_id(vendor_id, Some(vendor_id.to_string())),
            business_name: String::new(),
            contact_email: String::new(),
            contact_phone: String::new(),
            address: String::new(),
            currency: default_currency(),
            timezone: default_timezone(),
            notifications: NotificationSettings::default(),
            preferences: Map::new(),
        }
    }

    /// Apply a patch. Preference keys are merged, a `null` value removes one.
    pub fn apply(&mut self, patch: SettingsPatch) {
        let SettingsPatch {
            business_name,
            contact_email,
            contact_phone,
            address,
            currency,
            timezone,
            notifications,
            preferences,
        } = patch;
        if let Some(v) = business_name {
            self.business_name = v;
        }
        if let Some(v) = contact_email {
            self.contact_email = v;
        }
        if let Some(v) = contact_phone {
            self.contact_phone = v;
        }
        if let Some(v) = address {
            self.address = v;
        }
        if let Some(v) = currency {
            self.currency = v.trim().to_ascii_uppercase();
        }
        if let Some(v) = timezone {
            self.timezone = v;
        }
        if let Some(v) = notifications {
            self.notifications = v;
        }
        for (key, value) in preferences.into_iter().flatten() {
            if value.is_null() {
                self.preferences.remove(&key);
            } else {
                self.preferences.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_use_vendor_id_as_document_id() {
        let s = VendorSettings::defaults_for("v-9");
        assert_eq!(s.meta.id, "v-9");
        assert_eq!(s.meta.vendor_id.as_deref(), Some("v-9"));
        assert_eq!(s.currency, "USD");
        assert!(s.notifications.email);
    }

    #[test]
    fn patch_merges_preferences() {
        let mut s = VendorSettings::defaults_for("v1");
        s.preferences.insert("theme".into(), json!("dark"));
        s.preferences.insert("lang".into(), json!("en"));

        let patch: SettingsPatch = serde_json::from_value(json!({
            "businessName": "Coastline Coaches",
            "currency": " kes ",
            "preferences": { "theme": null, "pageSize": 25 }
        }))
        .unwrap();
        s.apply(patch);

        assert_eq!(s.business_name, "Coastline Coaches");
        assert_eq!(s.currency, "KES");
        assert!(s.preferences.get("theme").is_none());
        assert_eq!(s.preferences["lang"], "en");
        assert_eq!(s.preferences["pageSize"], 25);
    }
}
