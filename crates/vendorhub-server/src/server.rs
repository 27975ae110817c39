use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware, routing::get};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use vendorhub_auth::{AuthState, SessionTokens};
use vendorhub_db_postgres::PostgresStore;
use vendorhub_storage::DynStore;

use crate::config::{AppConfig, StorageBackend, StorageConfig};
use crate::payments::{DynPaymentGateway, PaymentService, PollSettings, gateway_from_config};
use crate::state::AppState;
use crate::{bootstrap, handlers, middleware as app_middleware, routes};

pub struct VendorhubServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

/// Open the configured document store.
pub async fn create_store(cfg: &StorageConfig) -> anyhow::Result<DynStore> {
    match cfg.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage");
            Ok(vendorhub_db_memory::create_store())
        }
        StorageBackend::Postgres => {
            let pg = cfg
                .postgres
                .as_ref()
                .context("storage.postgres is required for the postgres backend")?;
            let store = PostgresStore::connect(pg)
                .await
                .context("connecting to PostgreSQL")?;
            tracing::info!(pool_size = pg.pool_size, "using PostgreSQL storage");
            Ok(Arc::new(store))
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &axum::http::Request<_>| {
            use tracing::field::Empty;
            let req_id = req
                .extensions()
                .get::<axum::http::HeaderValue>()
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            tracing::info_span!(
                "http.request",
                http.method = %req.method(),
                http.target = %req.uri(),
                http.status_code = Empty,
                request_id = %req_id
            )
        })
        .on_response(
            |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                span.record(
                    "http.status_code",
                    tracing::field::display(res.status().as_u16()),
                );
                tracing::info!(
                    http.status = %res.status().as_u16(),
                    elapsed_ms = %latency.as_millis(),
                    "request handled"
                );
            },
        );

    // Outermost first: the request id must exist before the trace span opens.
    let stack = ServiceBuilder::new()
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(trace)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new());

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .merge(routes::api_router())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(stack)
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<DynStore>,
    gateway: Option<DynPaymentGateway>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
            gateway: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Use `store` instead of opening the configured backend.
    pub fn with_store(mut self, store: DynStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `gateway` instead of the one built from `payments.gateway_url`.
    pub fn with_gateway(mut self, gateway: DynPaymentGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Open storage, run the bootstrap and assemble the shared state.
    pub async fn build_state(self) -> anyhow::Result<(SocketAddr, AppState)> {
        let cfg = self.config;
        let store = match self.store {
            Some(store) => store,
            None => create_store(&cfg.storage).await?,
        };

        let tokens = Arc::new(SessionTokens::new(
            cfg.auth.session_secret.as_bytes(),
            cfg.auth.session_ttl_secs,
        ));
        let auth = AuthState::new(tokens, store.clone()).with_cookie_config(cfg.auth.cookie());

        let stats = bootstrap::run(&cfg.bootstrap, &store, &auth)
            .await
            .context("bootstrap failed")?;
        tracing::debug!(?stats, "bootstrap complete");

        let gateway = match self.gateway {
            Some(gateway) => gateway,
            None => gateway_from_config(&cfg.payments).context("payment gateway setup failed")?,
        };
        let payments = PaymentService::new(
            store.clone(),
            gateway,
            PollSettings::from(&cfg.payments),
        );
        let resumed = payments
            .resume_pending()
            .await
            .context("resuming pending payments")?;
        tracing::info!(
            gateway = payments.gateway_name(),
            resumed,
            "payment service ready"
        );

        let state = AppState {
            store,
            auth,
            payments,
            config: Arc::new(cfg),
        };
        Ok((self.addr, state))
    }

    pub async fn build(self) -> anyhow::Result<VendorhubServer> {
        let (addr, state) = self.build_state().await?;
        let app = build_app(state.clone());
        Ok(VendorhubServer { addr, app, state })
    }
}

impl VendorhubServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let payments = self.state.payments.clone();
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        payments.shutdown();
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
