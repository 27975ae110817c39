//! Authentication and authorization error types.

use vendorhub_api::ApiError;
use vendorhub_storage::StorageError;

/// Errors raised while authenticating a request or authorizing an action.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No usable credentials were presented.
    #[error("{message}")]
    Unauthorized { message: String },

    /// Login with an unknown email or a wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The token is malformed or its signature does not verify.
    #[error("Invalid session token: {message}")]
    InvalidToken { message: String },

    #[error("Session has expired")]
    TokenExpired,

    #[error("Session has been revoked")]
    TokenRevoked,

    /// Authenticated, but not allowed to do this.
    #[error("{message}")]
    Forbidden { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the caller is not authenticated (401).
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::InvalidCredentials
                | Self::InvalidToken { .. }
                | Self::TokenExpired
                | Self::TokenRevoked
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden { message } => ApiError::Forbidden(message),
            AuthError::Storage(e) => ApiError::Internal(e.to_string()),
            AuthError::Internal { message } => ApiError::Internal(message),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}
