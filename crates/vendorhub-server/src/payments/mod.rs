pub mod gateway;
pub mod service;

pub use gateway::{
    DynPaymentGateway, GatewayError, GatewayReceipt, GatewayStatus, GatewayStatusBody,
    HttpPaymentGateway, PaymentGateway, PaymentIntent, UnconfiguredGateway,
};
pub use service::{PaymentError, PaymentService, PollSettings, Settlement, UpgradeRequest};

use std::sync::Arc;
use std::time::Duration;

use crate::config::PaymentsConfig;

/// Gateway client for the configured URL, or [`UnconfiguredGateway`] when
/// none is set.
pub fn gateway_from_config(cfg: &PaymentsConfig) -> Result<DynPaymentGateway, GatewayError> {
    if cfg.gateway_url.trim().is_empty() {
        tracing::warn!("payments.gateway_url is not set; subscription upgrades will fail");
        return Ok(Arc::new(UnconfiguredGateway));
    }
    let gateway = HttpPaymentGateway::new(
        cfg.gateway_url.clone(),
        cfg.api_key.clone(),
        Duration::from_millis(cfg.request_timeout_ms),
    )?;
    Ok(Arc::new(gateway))
}

impl From<&PaymentsConfig> for PollSettings {
    fn from(cfg: &PaymentsConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.poll_interval_secs),
            max_attempts: cfg.max_poll_attempts,
        }
    }
}
