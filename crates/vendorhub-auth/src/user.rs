//! User accounts.

use serde::{Deserialize, Serialize};
use vendorhub_core::{CoreError, RecordMeta, Role, ServiceType, impl_entity};

/// A stored login.
///
/// `password_hash` is persisted but never sent to clients; responses use
/// [`UserView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Lowercased, trimmed.
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    pub active: bool,
}

impl_entity!(User, "users");

/// Input for [`User::new`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub vendor_id: Option<String>,
    pub service_type: Option<ServiceType>,
}

impl User {
    pub fn new(input: NewUser) -> Result<Self, CoreError> {
        let user = Self {
            meta: RecordMeta::with_id(vendorhub_core::generate_id(), input.vendor_id),
            email: normalize_email(&input.email),
            name: input.name.trim().to_string(),
            password_hash: input.password_hash,
            role: input.role,
            service_type: input.service_type,
            active: true,
        };
        user.validate()?;
        Ok(user)
    }

    /// Tenant-bound roles must name their vendor and its service type.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.email.contains('@') {
            return Err(CoreError::invalid_field("email", "must be an email address"));
        }
        if self.role.is_tenant_bound() {
            let mut missing = Vec::new();
            if self.meta.vendor_id.is_none() {
                missing.push("vendorId");
            }
            if self.service_type.is_none() {
                missing.push("serviceType");
            }
            if !missing.is_empty() {
                return Err(CoreError::missing_fields(missing));
            }
        }
        Ok(())
    }

    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

/// The public projection of a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    pub active: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.meta.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            vendor_id: user.meta.vendor_id.clone(),
            service_type: user.service_type,
            active: user.active,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(role: Role) -> NewUser {
        NewUser {
            email: "  Owner@Coastline.example ".to_string(),
            name: "Amina Yusuf".to_string(),
            password_hash: "$argon2id$fake".to_string(),
            role,
            vendor_id: None,
            service_type: None,
        }
    }

    #[test]
    fn admin_needs_no_tenant() {
        let user = User::new(input(Role::Admin)).unwrap();
        assert_eq!(user.email, "owner@coastline.example");
        assert!(user.meta.vendor_id.is_none());
    }

    #[test]
    fn vendor_user_requires_tenant_fields() {
        let err = User::new(input(Role::Vendor)).unwrap_err();
        assert_eq!(err.missing().unwrap(), ["vendorId", "serviceType"]);

        let mut ok = input(Role::Staff);
        ok.vendor_id = Some("v-1".into());
        ok.service_type = Some(ServiceType::Bus);
        assert!(User::new(ok).is_ok());
    }

    #[test]
    fn view_never_carries_the_hash() {
        let user = User::new(input(Role::Admin)).unwrap();
        let json = serde_json::to_value(user.view()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "admin");

        let stored = serde_json::to_value(&user).unwrap();
        assert_eq!(stored["passwordHash"], "$argon2id$fake");
    }
}
