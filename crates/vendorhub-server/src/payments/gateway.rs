//! Payment gateway client.
//!
//! The gateway accepts a payment intent and later reports whether the
//! customer completed it. Confirmation is asynchronous: callers poll
//! [`PaymentGateway::status`] or receive a webhook.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use vendorhub_core::models::PaymentMethod;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("payment gateway is not configured")]
    NotConfigured,
}

/// What the vendor is asked to pay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub reference: String,
    pub vendor_id: String,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub description: String,
}

/// Acknowledgement of an accepted intent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayReceipt {
    /// Reference to poll with. Gateways may assign their own.
    pub reference: String,
}

/// State of a payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Pending,
    Successful { transaction_id: Option<String> },
    Failed { message: String },
}

impl GatewayStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Wire shape of `GET /payments/{reference}` and of webhook bodies.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatusBody {
    pub status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TryFrom<GatewayStatusBody> for GatewayStatus {
    type Error = GatewayError;

    fn try_from(body: GatewayStatusBody) -> Result<Self, Self::Error> {
        match body.status.trim().to_ascii_lowercase().as_str() {
            "pending" | "processing" => Ok(Self::Pending),
            "successful" | "success" | "completed" => Ok(Self::Successful {
                transaction_id: body.transaction_id,
            }),
            "failed" | "declined" | "cancelled" => Ok(Self::Failed {
                message: body
                    .message
                    .unwrap_or_else(|| "Payment was declined".to_string()),
            }),
            other => Err(GatewayError::InvalidResponse(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a payment intent.
    async fn initiate(&self, intent: &PaymentIntent) -> Result<GatewayReceipt, GatewayError>;

    /// Current state of a submitted payment.
    async fn status(&self, reference: &str) -> Result<GatewayStatus, GatewayError>;

    fn name(&self) -> &'static str;
}

pub type DynPaymentGateway = Arc<dyn PaymentGateway>;

/// REST gateway client authenticated with a bearer API key.
pub struct HttpPaymentGateway {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initiate(&self, intent: &PaymentIntent) -> Result<GatewayReceipt, GatewayError> {
        let response = self
            .http_client
            .post(format!("{}/payments", self.base_url))
            .bearer_auth(&self.api_key)
            .json(intent)
            .send()
            .await?;
        let receipt: GatewayReceipt = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if receipt.reference.trim().is_empty() {
            return Err(GatewayError::InvalidResponse("empty reference".into()));
        }
        Ok(receipt)
    }

    async fn status(&self, reference: &str) -> Result<GatewayStatus, GatewayError> {
        let response = self
            .http_client
            .get(format!("{}/payments/{reference}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let body: GatewayStatusBody = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        body.try_into()
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Stand-in used when no gateway URL is configured; every call fails.
#[derive(Debug, Default)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn initiate(&self, _intent: &PaymentIntent) -> Result<GatewayReceipt, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn status(&self, _reference: &str) -> Result<GatewayStatus, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(status: &str) -> GatewayStatusBody {
        GatewayStatusBody {
            status: status.into(),
            transaction_id: Some("TX-1".into()),
            message: None,
        }
    }

    #[test]
    fn status_body_maps_to_gateway_status() {
        assert_eq!(GatewayStatus::try_from(body("pending")).unwrap(), GatewayStatus::Pending);
        assert_eq!(
            GatewayStatus::try_from(body("SUCCESSFUL")).unwrap(),
            GatewayStatus::Successful {
                transaction_id: Some("TX-1".into())
            }
        );
        assert_eq!(
            GatewayStatus::try_from(body("failed")).unwrap(),
            GatewayStatus::Failed {
                message: "Payment was declined".into()
            }
        );
        assert!(GatewayStatus::try_from(body("lost")).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let gw = HttpPaymentGateway::new("https://pay.example/v1/", "k", Duration::from_secs(1))
            .unwrap();
        assert_eq!(gw.base_url, "https://pay.example/v1");
    }
}
