//! Per-tenant settings document.

use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiResponse};
use vendorhub_auth::SessionAuth;
use vendorhub_core::models::{SettingsPatch, VendorSettings};

use crate::state::AppState;

/// GET /api/settings
///
/// Tenants that never saved settings get the defaults.
pub async fn read_settings(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
) -> Result<impl IntoResponse, ApiError> {
    let vendor_id = session.vendor_id()?;
    let settings = state
        .tenant::<VendorSettings>(&session)?
        .get(vendor_id)
        .await?
        .unwrap_or_else(|| VendorSettings::defaults_for(vendor_id));
    Ok(ApiResponse::ok(json!({ "settings": settings })))
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(patch): ApiJson<SettingsPatch>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_manager()?;
    let vendor_id = session.vendor_id()?;
    let repo = state.tenant::<VendorSettings>(&session)?;

    let settings = match repo.get(vendor_id).await? {
        Some(mut settings) => {
            settings.apply(patch);
            repo.update(&mut settings).await?;
            settings
        }
        None => {
            let mut settings = VendorSettings::defaults_for(vendor_id);
            settings.apply(patch);
            repo.insert(&settings).await?
        }
    };

    tracing::info!(vendor_id, "settings saved");
    Ok(ApiResponse::ok(json!({ "settings": settings })))
}
