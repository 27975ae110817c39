//! Tenant vocabulary: business verticals and user roles.

use crate::string_enum;

string_enum! {
    /// Business vertical a vendor operates in.
    pub enum ServiceType ("service type") {
        Bus => "bus",
        Hotel => "hotel",
        Pharmacy => "pharmacy",
        Store => "store",
    }
}

string_enum! {
    /// Role of an authenticated user.
    pub enum Role ("role") {
        /// Platform administrator; not bound to a tenant.
        Admin => "admin",
        /// Owner of a vendor account.
        Vendor => "vendor",
        /// Employee of a vendor with reduced rights.
        Staff => "staff",
    }
}

impl Role {
    /// Roles that may create, edit and delete tenant configuration.
    pub const MANAGERS: &'static [Role] = &[Role::Admin, Role::Vendor];

    /// Whether the role is bound to a single vendor.
    pub fn is_tenant_bound(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Bus".parse::<ServiceType>().unwrap(), ServiceType::Bus);
        assert_eq!(" pharmacy ".parse::<ServiceType>().unwrap(), ServiceType::Pharmacy);
        assert!("airline".parse::<ServiceType>().is_err());
    }

    #[test]
    fn serializes_as_lowercase_string() {
        assert_eq!(serde_json::to_string(&Role::Vendor).unwrap(), "\"vendor\"");
        let role: Role = serde_json::from_str("\"staff\"").unwrap();
        assert_eq!(role, Role::Staff);
    }

    #[test]
    fn unknown_code_names_the_enum() {
        let err = "pilot".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid role: 'pilot'");
    }

    #[test]
    fn admin_is_not_tenant_bound() {
        assert!(!Role::Admin.is_tenant_bound());
        assert!(Role::Staff.is_tenant_bound());
    }
}
