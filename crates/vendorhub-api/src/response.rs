use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::ApiError;

/// Success envelope: the payload's fields are merged next to `"success": true`.
///
/// The payload must serialize as a JSON object.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    success: bool,
    #[serde(flatten)]
    payload: &'a T,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            success: true,
            payload: &self.value,
        };
        let body = match serde_json::to_vec(&envelope) {
            Ok(b) => b,
            Err(e) => return ApiError::internal(format!("response serialization: {e}")).into_response(),
        };
        let mut response = (
            self.status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response();
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn payload_is_merged_next_to_success() {
        let resp = ApiResponse::created(json!({"dispatch": {"id": "d1"}})).into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"success": true, "dispatch": {"id": "d1"}}));
    }

    #[tokio::test]
    async fn non_object_payload_is_a_server_error() {
        let resp = ApiResponse::ok(vec![1, 2, 3]).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn extra_headers_are_kept() {
        let resp = ApiResponse::ok(json!({}))
            .with_header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .into_response();
        assert_eq!(resp.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    }
}
