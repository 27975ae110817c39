//! Subscription payments and the gateway webhook.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse};
use vendorhub_auth::SessionAuth;
use vendorhub_core::models::{Payment, PaymentStatus};
use vendorhub_storage::Query;

use super::{ListParams, find_page};
use crate::payments::{GatewayStatus, GatewayStatusBody};
use crate::state::AppState;

/// Header carrying the shared webhook secret.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub reference: Option<String>,
    #[serde(flatten)]
    pub result: GatewayStatusBody,
}

/// GET /api/payments
pub async fn list_payments(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.tenant::<Payment>(&session)?;
    let query = Query::new()
        .eq_opt("status", params.status::<PaymentStatus>()?.map(|s| s.as_str()))
        .search(params.search(), ["reference", "transactionId"]);
    let query = params.timestamp_range("createdAt", query)?;
    let (items, pagination) = find_page(&repo, query, state.page(&params.page)).await?;
    Ok(ApiResponse::ok(json!({
        "payments": items,
        "pagination": pagination,
    })))
}

/// GET /api/payments/{reference}
///
/// Clients may poll this while the server confirms the payment.
pub async fn read_payment(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.payments.get(session.vendor_id()?, &reference).await?;
    Ok(ApiResponse::ok(json!({
        "payment": payment,
        "polling": state.payments.is_polling(&reference),
    })))
}

/// POST /api/payments/{reference}/cancel
pub async fn cancel_payment(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_manager()?;
    let payment = state.payments.cancel(session.vendor_id()?, &reference).await?;
    Ok(ApiResponse::ok(json!({ "payment": payment })))
}

/// POST /api/payments/callback
///
/// Gateway webhook authenticated by `x-webhook-secret`. Refused outright
/// while no secret is configured.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<CallbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let expected = state.config.payments.webhook_secret.as_str();
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if expected.is_empty() || presented != expected {
        tracing::warn!("payment callback rejected: bad webhook secret");
        return Err(ApiError::unauthorized("Invalid webhook secret"));
    }

    let reference = body
        .reference
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::missing_fields(["reference"]))?;
    let status = GatewayStatus::try_from(body.result)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    tracing::info!(reference = %reference, ?status, "payment callback received");
    let payment = state.payments.handle_callback(&reference, status).await?;
    Ok(ApiResponse::ok(json!({ "payment": payment })))
}
