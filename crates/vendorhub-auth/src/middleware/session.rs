//! Session extractor.
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use vendorhub_auth::{AuthState, SessionAuth};
//!
//! async fn whoami(SessionAuth(session): SessionAuth) -> String {
//!     session.user().email.clone()
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .with_state(auth_state);
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, header::COOKIE, request::Parts},
};
use vendorhub_core::models::Vendor;
use vendorhub_core::{Role, ServiceType};
use vendorhub_storage::{DynStore, Query, Repository, Scope};

use crate::config::CookieConfig;
use crate::error::AuthError;
use crate::password::verify_password_async;
use crate::token::{IssuedToken, SessionClaims, SessionTokens};
use crate::user::{User, UserView, normalize_email};

// =============================================================================
// Auth State
// =============================================================================

/// State needed to authenticate requests.
///
/// Made available to [`SessionAuth`] via `FromRef` on the application state.
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<SessionTokens>,
    pub store: DynStore,
    pub cookie_config: CookieConfig,
}

impl AuthState {
    pub fn new(tokens: Arc<SessionTokens>, store: DynStore) -> Self {
        Self {
            tokens,
            store,
            cookie_config: CookieConfig::default(),
        }
    }

    #[must_use]
    pub fn with_cookie_config(mut self, cookie_config: CookieConfig) -> Self {
        self.cookie_config = cookie_config;
        self
    }

    /// Every user account, regardless of tenant.
    pub fn users(&self) -> Repository<User> {
        Repository::new(self.store.clone(), Scope::Platform)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users()
            .find_one(Query::new().eq("email", normalize_email(email)))
            .await?)
    }

    /// Check credentials and sign a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, IssuedToken), AuthError> {
        let Some(user) = self.find_user_by_email(email).await? else {
            tracing::debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password_async(password.to_string(), user.password_hash.clone()).await? {
            tracing::debug!(user_id = %user.meta.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.active {
            return Err(AuthError::unauthorized("User account is disabled"));
        }
        self.check_vendor_active(&user).await?;

        let issued = self.tokens.issue(&user)?;
        tracing::info!(user_id = %user.meta.id, role = %user.role, "user logged in");
        Ok((user, issued))
    }

    /// Revoke the session presented in `headers`, if it is still valid.
    ///
    /// Returns whether a session was revoked.
    pub fn logout(&self, headers: &HeaderMap) -> bool {
        let Some(token) = extract_token(headers, &self.cookie_config) else {
            return false;
        };
        match self.tokens.verify(&token) {
            Ok(claims) => {
                self.tokens.revoke(&claims);
                tracing::info!(user_id = %claims.sub, "session revoked");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "logout with unusable token");
                false
            }
        }
    }

    pub fn session_cookie(&self, issued: &IssuedToken) -> String {
        self.cookie_config.build_cookie(&issued.token, issued.ttl_secs)
    }

    pub fn clear_cookie(&self) -> String {
        self.cookie_config.build_clear_cookie()
    }

    async fn check_vendor_active(&self, user: &User) -> Result<(), AuthError> {
        let Some(vendor_id) = user.meta.vendor_id.as_deref() else {
            return Ok(());
        };
        let vendors = Repository::<Vendor>::new(self.store.clone(), Scope::Platform);
        match vendors.get(vendor_id).await? {
            Some(vendor) if !vendor.active => {
                Err(AuthError::forbidden("Vendor account is suspended"))
            }
            _ => Ok(()),
        }
    }

    async fn load_session(&self, token: &str) -> Result<Session, AuthError> {
        let claims = self.tokens.verify(token).inspect_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
        })?;

        let user = self.users().get(&claims.sub).await?.ok_or_else(|| {
            tracing::warn!(user_id = %claims.sub, "session for missing user");
            AuthError::unauthorized("User no longer exists")
        })?;
        if !user.active {
            tracing::warn!(user_id = %user.meta.id, "session for disabled user");
            return Err(AuthError::unauthorized("User account is disabled"));
        }
        self.check_vendor_active(&user).await?;

        Ok(Session { user, claims })
    }
}

// =============================================================================
// Session
// =============================================================================

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct Session {
    user: User,
    claims: SessionClaims,
}

impl Session {
    pub fn new(user: User, claims: SessionClaims) -> Self {
        Self { user, claims }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    pub fn view(&self) -> UserView {
        self.user.view()
    }

    pub fn user_id(&self) -> &str {
        &self.user.meta.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    pub fn service_type(&self) -> Option<ServiceType> {
        self.user.service_type
    }

    /// The caller's tenant.
    pub fn vendor_id(&self) -> Result<&str, AuthError> {
        self.user
            .meta
            .vendor_id
            .as_deref()
            .ok_or_else(|| AuthError::forbidden("No vendor account is associated with this session"))
    }

    /// Repository scope for the caller's tenant.
    pub fn scope(&self) -> Result<Scope, AuthError> {
        self.vendor_id().map(Scope::tenant)
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&self.user.role) {
            Ok(())
        } else {
            Err(AuthError::forbidden("Insufficient permissions"))
        }
    }

    /// Tenant owners and platform admins.
    pub fn require_manager(&self) -> Result<(), AuthError> {
        self.require_role(Role::MANAGERS)
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        self.require_role(&[Role::Admin])
    }

    /// Restrict a feature to one business vertical. Admins pass.
    pub fn require_service(&self, service: ServiceType) -> Result<(), AuthError> {
        if self.is_admin() || self.user.service_type == Some(service) {
            Ok(())
        } else {
            Err(AuthError::forbidden(format!(
                "This feature is only available to {service} vendors"
            )))
        }
    }
}

// =============================================================================
// Session Extractor
// =============================================================================

/// Extractor that authenticates the request.
///
/// 1. Reads the token from `Authorization: Bearer`, else the session cookie
/// 2. Verifies signature, expiry and revocation
/// 3. Loads the user and checks it and its vendor are active
///
/// Rejects with [`AuthError`] (401, or 403 for a suspended vendor).
pub struct SessionAuth(pub Session);

impl<S> FromRequestParts<S> for SessionAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let token = extract_token(&parts.headers, &auth_state.cookie_config)
            .ok_or_else(|| AuthError::unauthorized("Authentication required"))?;

        let session = auth_state.load_session(&token).await?;
        tracing::debug!(
            user_id = %session.user_id(),
            role = %session.role(),
            "session authenticated"
        );
        Ok(SessionAuth(session))
    }
}

/// Session token from the `Authorization` header or, failing that, the
/// session cookie.
pub fn extract_token(headers: &HeaderMap, cookie_config: &CookieConfig) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    extract_token_from_cookie(headers, cookie_config)
}

fn extract_token_from_cookie(headers: &HeaderMap, cookie_config: &CookieConfig) -> Option<String> {
    if !cookie_config.enabled {
        return None;
    }
    let cookie_header = headers.get(COOKIE)?.to_str().ok()?;
    for cookie in cookie_header.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=')
            && name.trim() == cookie_config.name
        {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let h = headers(&[
            ("authorization", "Bearer header-token"),
            ("cookie", "vendorhub_session=cookie-token"),
        ]);
        assert_eq!(
            extract_token(&h, &CookieConfig::default()).as_deref(),
            Some("header-token")
        );
    }

    #[test]
    fn falls_back_to_named_cookie() {
        let h = headers(&[("cookie", "theme=dark; vendorhub_session=abc.def ; other=1")]);
        assert_eq!(
            extract_token(&h, &CookieConfig::default()).as_deref(),
            Some("abc.def")
        );
    }

    #[test]
    fn disabled_cookie_or_blank_values_yield_nothing() {
        let h = headers(&[("cookie", "vendorhub_session=abc")]);
        let disabled = CookieConfig {
            enabled: false,
            ..CookieConfig::default()
        };
        assert!(extract_token(&h, &disabled).is_none());

        let h = headers(&[("authorization", "Bearer "), ("cookie", "vendorhub_session=")]);
        assert!(extract_token(&h, &CookieConfig::default()).is_none());
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert!(extract_token(&h, &CookieConfig::default()).is_none());
    }
}
