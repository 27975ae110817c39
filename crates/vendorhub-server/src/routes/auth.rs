//! Login, logout and the current session.

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiResponse};
use vendorhub_auth::SessionAuth;
use vendorhub_core::validation::{Required, take};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn cookie_header(value: String) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&value).map_err(|e| ApiError::internal(format!("invalid cookie: {e}")))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Required::new()
        .text("email", &body.email)
        .text("password", &body.password)
        .finish()?;
    let email = take("email", body.email)?;
    let password = take("password", body.password)?;

    let (user, issued) = state.auth.login(&email, &password).await?;
    let cookie = cookie_header(state.auth.session_cookie(&issued))?;

    Ok(ApiResponse::ok(json!({
        "user": user.view(),
        "token": issued.token,
        "expiresIn": issued.ttl_secs,
    }))
    .with_header(header::SET_COOKIE, cookie))
}

/// POST /api/auth/logout
///
/// Succeeds whether or not a live session was presented.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state.auth.logout(&headers);
    let cookie = cookie_header(state.auth.clear_cookie())?;
    Ok(ApiResponse::ok(json!({
        "message": "Logged out",
        "revoked": revoked,
    }))
    .with_header(header::SET_COOKIE, cookie))
}

/// GET /api/auth/session
pub async fn session(SessionAuth(session): SessionAuth) -> impl IntoResponse {
    ApiResponse::ok(json!({
        "user": session.view(),
        "expiresAt": session.claims().exp,
    }))
}
