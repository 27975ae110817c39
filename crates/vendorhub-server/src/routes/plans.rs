//! Plan catalogue visible to tenants.

use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;
use vendorhub_api::{ApiError, ApiResponse};
use vendorhub_auth::SessionAuth;
use vendorhub_core::models::Plan;
use vendorhub_storage::Query;

use crate::state::AppState;

/// GET /api/plans
///
/// Active plans the caller's vertical may buy, cheapest first. Admins see
/// every active plan.
pub async fn list_plans(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
) -> Result<impl IntoResponse, ApiError> {
    let plans: Vec<Plan> = state
        .platform::<Plan>()
        .find_all(Query::new().eq("active", true).sort_by("price", false))
        .await?
        .into_iter()
        .filter(|p| session.service_type().is_none_or(|s| p.is_available_to(s)))
        .collect();
    Ok(ApiResponse::ok(json!({ "plans": plans })))
}
