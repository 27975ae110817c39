#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use vendorhub_server::config::{AdminUserConfig, AppConfig};
use vendorhub_server::payments::{
    GatewayError, GatewayReceipt, GatewayStatus, PaymentGateway, PaymentIntent,
};
use vendorhub_server::{ServerBuilder, build_app};

pub const ADMIN_EMAIL: &str = "admin@vendorhub.test";
pub const ADMIN_PASSWORD: &str = "admin-password-1";
pub const WEBHOOK_SECRET: &str = "hook-secret";

/// Gateway double: accepts every intent and reports `status` when polled.
pub struct FakeGateway {
    pub status: Mutex<GatewayStatus>,
    pub intents: Mutex<Vec<PaymentIntent>>,
}

impl FakeGateway {
    pub fn new(status: GatewayStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            intents: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, status: GatewayStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate(&self, intent: &PaymentIntent) -> Result<GatewayReceipt, GatewayError> {
        self.intents.lock().unwrap().push(intent.clone());
        Ok(GatewayReceipt {
            reference: intent.reference.clone(),
        })
    }

    async fn status(&self, _reference: &str) -> Result<GatewayStatus, GatewayError> {
        Ok(self.status.lock().unwrap().clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.session_secret = "test-secret-test-secret-test-secret".into();
    cfg.payments.webhook_secret = WEBHOOK_SECRET.into();
    cfg.payments.poll_interval_secs = 1;
    cfg.payments.max_poll_attempts = 3;
    cfg.bootstrap.admin_user = Some(AdminUserConfig {
        email: ADMIN_EMAIL.into(),
        password: ADMIN_PASSWORD.into(),
        name: "Platform Admin".into(),
    });
    cfg
}

pub struct TestServer {
    pub base: String,
    pub client: Client,
    pub gateway: Arc<FakeGateway>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(test_config(), GatewayStatus::Pending).await
    }

    pub async fn start_with(cfg: AppConfig, gateway_status: GatewayStatus) -> Self {
        let gateway = FakeGateway::new(gateway_status);
        let (_, state) = ServerBuilder::new()
            .with_config(cfg)
            .with_store(vendorhub_db_memory::create_store())
            .with_gateway(gateway.clone())
            .build_state()
            .await
            .expect("build state");
        let app = build_app(state);

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
            gateway,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn put(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn patch(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "login failed for {email}");
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Create a vendor through the admin API and log in as its owner.
    /// Returns `(vendor_id, owner_token)`.
    pub async fn vendor(&self, name: &str, service_type: &str) -> (String, String) {
        let admin = self.admin_token().await;
        let email = format!("{}@vendors.test", name.to_lowercase().replace(' ', "-"));
        let resp = self
            .post(
                "/api/admin/vendors",
                &admin,
                json!({
                    "name": name,
                    "serviceType": service_type,
                    "email": email,
                    "password": "owner-password-1",
                }),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        let vendor_id = body["vendor"]["id"].as_str().unwrap().to_string();
        let token = self.login(&email, "owner-password-1").await;
        (vendor_id, token)
    }

    /// Add a login to an existing vendor and return its token.
    pub async fn vendor_user(&self, vendor_id: &str, email: &str, role: &str) -> String {
        let admin = self.admin_token().await;
        let resp = self
            .post(
                &format!("/api/admin/vendors/{vendor_id}/users"),
                &admin,
                json!({
                    "email": email,
                    "name": "Team Member",
                    "password": "member-password-1",
                    "role": role,
                }),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        self.login(email, "member-password-1").await
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Response status and JSON body.
pub async fn json_of(resp: Response) -> (StatusCode, Value) {
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

/// Create a bus, a route and a driver for a bus tenant.
/// Returns `(bus_id, route_id, driver_id)`.
pub async fn seed_fleet(server: &TestServer, token: &str) -> (String, String, String) {
    let (status, bus) = json_of(
        server
            .post(
                "/api/fleet",
                token,
                json!({ "registrationNumber": "kbx 123a", "model": "Scania", "capacity": 2 }),
            )
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{bus}");

    let (status, route) = json_of(
        server
            .post(
                "/api/routes",
                token,
                json!({
                    "name": "Coast Express",
                    "origin": "Nairobi",
                    "destination": "Mombasa",
                    "fare": 1500,
                }),
            )
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{route}");

    let (status, driver) = json_of(
        server
            .post(
                "/api/staff",
                token,
                json!({
                    "name": "Jane Driver",
                    "phone": "+254700000001",
                    "role": "driver",
                    "licenseNumber": "DL-001",
                }),
            )
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{driver}");

    (
        bus["bus"]["id"].as_str().unwrap().to_string(),
        route["route"]["id"].as_str().unwrap().to_string(),
        driver["staff"]["id"].as_str().unwrap().to_string(),
    )
}
