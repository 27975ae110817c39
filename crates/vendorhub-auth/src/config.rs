//! Session and cookie configuration.

use serde::{Deserialize, Serialize};

/// Minimum accepted length of the token signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Session authentication settings.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// session_secret = "change-me-to-at-least-32-random-bytes"
/// session_ttl_secs = 86400
/// cookie_name = "vendorhub_session"
/// cookie_secure = true
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens.
    pub session_secret: String,

    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Name of the session cookie.
    pub cookie_name: String,

    /// Send the cookie over HTTPS only.
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            session_ttl_secs: 24 * 3600,
            cookie_name: "vendorhub_session".to_string(),
            cookie_secure: false,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.session_secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "auth.session_secret must be at least {MIN_SECRET_LEN} bytes"
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err("auth.session_ttl_secs must be greater than 0".to_string());
        }
        if self.cookie_name.trim().is_empty() {
            return Err("auth.cookie_name must not be empty".to_string());
        }
        Ok(())
    }

    pub fn cookie(&self) -> CookieConfig {
        CookieConfig {
            enabled: true,
            name: self.cookie_name.clone(),
            secure: self.cookie_secure,
            ..CookieConfig::default()
        }
    }
}

/// How the session cookie is written and read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    /// Accept tokens from the cookie at all.
    pub enabled: bool,
    pub name: String,
    pub secure: bool,
    pub same_site: &'static str,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "vendorhub_session".to_string(),
            secure: false,
            same_site: "Lax",
            path: "/".to_string(),
        }
    }
}

impl CookieConfig {
    /// `Set-Cookie` value carrying `token` for `max_age_secs`.
    pub fn build_cookie(&self, token: &str, max_age_secs: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite={}",
            self.name, token, self.path, max_age_secs, self.same_site
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn build_clear_cookie(&self) -> String {
        self.build_cookie("", 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_http_only() {
        let cookie = CookieConfig::default().build_cookie("abc", 3600);
        assert_eq!(
            cookie,
            "vendorhub_session=abc; Path=/; Max-Age=3600; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn secure_flag_and_clear_cookie() {
        let config = AuthConfig {
            cookie_secure: true,
            cookie_name: "vh".to_string(),
            ..AuthConfig::default()
        };
        let clear = config.cookie().build_clear_cookie();
        assert!(clear.starts_with("vh=; "));
        assert!(clear.contains("Max-Age=0"));
        assert!(clear.ends_with("; Secure"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut config = AuthConfig {
            session_secret: "short".to_string(),
            ..AuthConfig::default()
        };
        assert!(config.validate().is_err());
        config.session_secret = "x".repeat(MIN_SECRET_LEN);
        assert!(config.validate().is_ok());
    }
}
