//! Axum integration: auth state, the session extractor and error responses.

mod error;
mod session;

pub use session::{AuthState, Session, SessionAuth, extract_token};
