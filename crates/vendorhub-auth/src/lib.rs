//! # vendorhub-auth
//!
//! Session authentication for VendorHub.
//!
//! - [`password`]: Argon2id password hashing
//! - [`token`]: signed HS256 session tokens and the revocation list
//! - [`user`]: the stored user account and its public projection
//! - [`middleware`]: the [`SessionAuth`] extractor and role/service guards
//!
//! ```ignore
//! use vendorhub_auth::{SessionAuth, AuthState};
//!
//! async fn handler(SessionAuth(session): SessionAuth) -> Result<String, ApiError> {
//!     let vendor_id = session.vendor_id()?;
//!     Ok(vendor_id.to_string())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod password;
pub mod token;
pub mod user;

pub use config::{AuthConfig, CookieConfig};
pub use error::AuthError;
pub use middleware::{AuthState, Session, SessionAuth, extract_token};
pub use token::{IssuedToken, RevocationList, SessionClaims, SessionTokens};
pub use user::{NewUser, User, UserView};

/// Convenience result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
