//! Session tokens.
//!
//! Sessions are HS256 JWTs signed with `auth.session_secret`. Logging out
//! records the token id (`jti`) in a [`RevocationList`] until the token would
//! have expired anyway.

use dashmap::DashMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use vendorhub_core::{Role, ServiceType};

use crate::error::AuthError;
use crate::user::User;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
    pub ttl_secs: u64,
}

/// Signs and verifies session tokens.
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    revoked: RevocationList,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("ttl_secs", &self.ttl_secs)
            .field("revoked", &self.revoked.len())
            .finish_non_exhaustive()
    }
}

impl SessionTokens {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
            revoked: RevocationList::default(),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn revocations(&self) -> &RevocationList {
        &self.revoked
    }

    /// Sign a session for `user`.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            sub: user.meta.id.clone(),
            role: user.role,
            vendor_id: user.meta.vendor_id.clone(),
            service_type: user.service_type,
            exp: now.saturating_add(ttl),
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        self.sign(claims)
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: SessionClaims) -> Result<IssuedToken, AuthError> {
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("failed to sign session token: {e}")))?;
        Ok(IssuedToken {
            token,
            claims,
            ttl_secs: self.ttl_secs,
        })
    }

    /// Verify signature, expiry and revocation.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::invalid_token(e.to_string()),
            })?
            .claims;

        if self.revoked.is_revoked(&claims.jti) {
            tracing::debug!(jti = %claims.jti, "revoked session token presented");
            return Err(AuthError::TokenRevoked);
        }
        Ok(claims)
    }

    /// Revoke the session carried by `claims`.
    pub fn revoke(&self, claims: &SessionClaims) {
        self.revoked.revoke(&claims.jti, claims.exp);
        self.revoked
            .purge_expired(OffsetDateTime::now_utc().unix_timestamp());
    }
}

/// Token ids revoked before their expiry.
#[derive(Debug, Default)]
pub struct RevocationList {
    entries: DashMap<String, i64>,
}

impl RevocationList {
    pub fn revoke(&self, jti: &str, expires_at: i64) {
        self.entries.insert(jti.to_string(), expires_at);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.entries.contains_key(jti)
    }

    /// Forget entries whose token has expired by `now`.
    pub fn purge_expired(&self, now: i64) {
        self.entries.retain(|_, exp| *exp > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::NewUser;

    const SECRET: &[u8] = b"test-secret-test-secret-test-secret!";

    fn user() -> User {
        User::new(NewUser {
            email: "ops@coastline.example".into(),
            name: "Ops".into(),
            password_hash: "x".into(),
            role: Role::Vendor,
            vendor_id: Some("v-1".into()),
            service_type: Some(ServiceType::Bus),
        })
        .unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let tokens = SessionTokens::new(SECRET, 3600);
        let issued = tokens.issue(&user()).unwrap();
        let claims = tokens.verify(&issued.token).unwrap();
        assert_eq!(claims.role, Role::Vendor);
        assert_eq!(claims.vendor_id.as_deref(), Some("v-1"));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let issued = SessionTokens::new(SECRET, 60).issue(&user()).unwrap();
        let other = SessionTokens::new(b"another-secret-another-secret-00", 60);
        assert!(matches!(
            other.verify(&issued.token),
            Err(AuthError::InvalidToken { .. })
        ));
        assert!(matches!(
            other.verify("not.a.jwt"),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let tokens = SessionTokens::new(SECRET, 60);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let issued = tokens
            .sign(SessionClaims {
                sub: "u-1".into(),
                role: Role::Admin,
                vendor_id: None,
                service_type: None,
                exp: now - 10,
                iat: now - 70,
                jti: "j-1".into(),
            })
            .unwrap();
        assert!(matches!(tokens.verify(&issued.token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn revoked_token_is_refused() {
        let tokens = SessionTokens::new(SECRET, 60);
        let issued = tokens.issue(&user()).unwrap();
        tokens.revoke(&issued.claims);
        assert!(matches!(tokens.verify(&issued.token), Err(AuthError::TokenRevoked)));
        assert_eq!(tokens.revocations().len(), 1);
    }

    #[test]
    fn purge_drops_expired_entries() {
        let list = RevocationList::default();
        list.revoke("old", 100);
        list.revoke("new", 300);
        list.purge_expired(200);
        assert!(!list.is_revoked("old"));
        assert!(list.is_revoked("new"));
    }
}
