use serde::{Deserialize, Serialize};

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::impl_entity;

/// A bus route operated by a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusRoute {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub stops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Minor currency units.
    pub fare: u64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl_entity!(BusRoute, "routes");

impl BusRoute {
    pub fn validate(&self) -> Result<()> {
        if self.origin.eq_ignore_ascii_case(&self.destination) {
            return Err(CoreError::invalid_field(
                "destination",
                "must differ from origin",
            ));
        }
        if let Some(km) = self.distance_km
            && !(km.is_finite() && km > 0.0)
        {
            return Err(CoreError::invalid_field("distanceKm", "must be positive"));
        }
        Ok(())
    }

    /// Label used in listings and exports, e.g. `Nairobi → Mombasa`.
    pub fn label(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(origin: &str, destination: &str) -> BusRoute {
        BusRoute {
            meta: RecordMeta::for_vendor("v1"),
            name: "Coast Express".into(),
            origin: origin.into(),
            destination: destination.into(),
            stops: vec!["Voi".into()],
            distance_km: Some(480.0),
            duration_minutes: Some(480),
            fare: 150_000,
            active: true,
        }
    }

    #[test]
    fn same_endpoints_rejected() {
        assert!(route("Nairobi", "Mombasa").validate().is_ok());
        let err = route("Nairobi", "nairobi").validate().unwrap_err();
        assert!(err.to_string().contains("destination"));
    }

    #[test]
    fn distance_must_be_positive() {
        let mut r = route("A", "B");
        r.distance_km = Some(0.0);
        assert!(r.validate().is_err());
        r.distance_km = None;
        assert!(r.validate().is_ok());
    }
}
