use std::fs;

use vendorhub_server::config::StorageBackend;
use vendorhub_server::config::loader::load_config;

const SECRET: &str = "0123456789abcdef0123456789abcdef";

#[test]
fn loads_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vendorhub.toml");
    fs::write(
        &path,
        format!(
            r#"
[server]
host = "127.0.0.1"
port = 9090

[auth]
session_secret = "{SECRET}"

[payments]
gateway_url = "https://pay.example/v1"
poll_interval_secs = 5
max_poll_attempts = 12

[[bootstrap.plans]]
name = "Starter"
service_type = "bus"
price = 2500
limits = {{ buses = 5, dispatches = 100 }}
"#
        ),
    )
    .unwrap();

    let cfg = load_config(path.to_str()).expect("config loads");
    assert_eq!(cfg.server.port, 9090);
    assert_eq!(cfg.addr().to_string(), "127.0.0.1:9090");
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.payments.poll_interval_secs, 5);
    assert_eq!(cfg.payments.max_poll_attempts, 12);
    assert_eq!(cfg.bootstrap.plans.len(), 1);
    assert_eq!(cfg.bootstrap.plans[0].currency, "USD");
    assert_eq!(cfg.bootstrap.plans[0].limits.len(), 2);
}

#[test]
fn short_secret_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vendorhub.toml");
    fs::write(&path, "[auth]\nsession_secret = \"short\"\n").unwrap();

    let err = load_config(path.to_str()).expect_err("secret too short");
    assert!(err.contains("session_secret"));
}

#[test]
fn postgres_backend_needs_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vendorhub.toml");
    fs::write(
        &path,
        format!("[auth]\nsession_secret = \"{SECRET}\"\n[storage]\nbackend = \"postgres\"\n"),
    )
    .unwrap();

    let err = load_config(path.to_str()).expect_err("postgres without url");
    assert!(err.contains("storage.postgres.url"));
}
