use std::collections::BTreeMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use vendorhub_auth::AuthConfig;
use vendorhub_core::ServiceType;
use vendorhub_core::models::{BillingCycle, UsageResource};
use vendorhub_db_postgres::PostgresConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Session signing and cookie settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Payment gateway and confirmation polling
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Records created on first start
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Storage validations
        if self.storage.backend == StorageBackend::Postgres
            && self
                .storage
                .postgres
                .as_ref()
                .is_none_or(|pg| pg.url.trim().is_empty())
        {
            return Err("storage.postgres.url is required when storage.backend = \"postgres\"".into());
        }
        self.auth.validate()?;
        // Payment validations
        if self.payments.poll_interval_secs == 0 {
            return Err("payments.poll_interval_secs must be > 0".into());
        }
        if self.payments.max_poll_attempts == 0 {
            return Err("payments.max_poll_attempts must be > 0".into());
        }
        if !self.payments.gateway_url.is_empty()
            && !(self.payments.gateway_url.starts_with("http://")
                || self.payments.gateway_url.starts_with("https://"))
        {
            return Err("payments.gateway_url must be an http(s) URL".into());
        }
        // Pagination validations
        if self.pagination.default_limit == 0 {
            return Err("pagination.default_limit must be > 0".into());
        }
        if self.pagination.default_limit > self.pagination.max_limit {
            return Err("pagination.default_limit must be <= pagination.max_limit".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Bootstrap validation
        if let Some(admin) = &self.bootstrap.admin_user {
            if !admin.email.contains('@') {
                return Err("bootstrap.admin_user.email must be an email address".into());
            }
            vendorhub_auth::password::check_strength(&admin.password)
                .map_err(|e| format!("bootstrap.admin_user.password: {e}"))?;
        }
        for plan in &self.bootstrap.plans {
            if plan.name.trim().is_empty() {
                return Err("bootstrap.plans[].name must not be empty".into());
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Base URL of the payment gateway API. Empty disables upgrades.
    pub gateway_url: String,
    /// Bearer key sent to the gateway.
    pub api_key: String,
    /// Shared secret expected in `x-webhook-secret` on gateway callbacks.
    pub webhook_secret: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub request_timeout_ms: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            api_key: String::new(),
            webhook_secret: String::new(),
            poll_interval_secs: 10,
            max_poll_attempts: 30,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub admin_user: Option<AdminUserConfig>,
    #[serde(default)]
    pub plans: Vec<PlanSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
}

fn default_admin_name() -> String {
    "Administrator".into()
}

/// A plan created when the plan catalogue is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSeed {
    pub name: String,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    /// Minor currency units.
    #[serde(default)]
    pub price: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_billing_cycle")]
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub limits: BTreeMap<UsageResource, u32>,
}

fn default_currency() -> String {
    "USD".into()
}
fn default_billing_cycle() -> BillingCycle {
    BillingCycle::Monthly
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default config file, relative to the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "vendorhub.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            tracing::warn!(path = %pathbuf.display(), "config file not found; using defaults and environment");
        }
        // Environment variable overrides, e.g., VENDORHUB__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("VENDORHUB")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.auth.session_secret = "0123456789abcdef0123456789abcdef".into();
        cfg
    }

    #[test]
    fn defaults_need_only_a_secret() {
        assert!(AppConfig::default().validate().is_err());
        let cfg = valid();
        cfg.validate().unwrap();
        assert_eq!(cfg.payments.poll_interval_secs, 10);
        assert_eq!(cfg.payments.max_poll_attempts, 30);
        assert_eq!(cfg.pagination.default_limit, 10);
        assert_eq!(cfg.addr().port(), 8080);
    }

    #[test]
    fn pagination_bounds_are_checked() {
        let mut cfg = valid();
        cfg.pagination.default_limit = 200;
        assert!(cfg.validate().unwrap_err().contains("default_limit"));
    }

    #[test]
    fn postgres_backend_requires_url() {
        let mut cfg = valid();
        cfg.storage.backend = StorageBackend::Postgres;
        assert!(cfg.validate().is_err());
        cfg.storage.postgres = Some(PostgresConfig::new("postgres://localhost/vh"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn log_level_and_gateway_url_are_checked() {
        let mut cfg = valid();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.payments.gateway_url = "ftp://pay.example".into();
        assert!(cfg.validate().is_err());
    }
}
