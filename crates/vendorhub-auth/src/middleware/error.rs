//! `IntoResponse` for [`AuthError`]: the usual `{ "error": ... }` body plus a
//! `WWW-Authenticate` challenge on 401.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, challenge) = error_details(&self);
        let message = match &self {
            AuthError::Storage(e) => {
                tracing::error!(error = %e, "session lookup failed");
                "Internal server error".to_string()
            }
            AuthError::Internal { message } => {
                tracing::error!(error = %message, "authentication failed internally");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut headers = HeaderMap::new();
        if let Some(code) = challenge {
            let value = build_www_authenticate_header(code, &message);
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(json!({ "error": message }))).into_response()
    }
}

/// HTTP status and, for 401s, the bearer challenge error code.
fn error_details(error: &AuthError) -> (StatusCode, Option<&'static str>) {
    match error {
        AuthError::Unauthorized { .. } | AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, Some("unauthorized"))
        }
        AuthError::InvalidToken { .. } | AuthError::TokenExpired | AuthError::TokenRevoked => {
            (StatusCode::UNAUTHORIZED, Some("invalid_token"))
        }
        AuthError::Forbidden { .. } => (StatusCode::FORBIDDEN, None),
        AuthError::Storage(_) | AuthError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, None)
        }
    }
}

fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped = description.replace('"', "\\\"");
    format!("Bearer realm=\"vendorhub\", error=\"{error}\", error_description=\"{escaped}\"")
}
