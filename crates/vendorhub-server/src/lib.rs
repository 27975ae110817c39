pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod payments;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{
    AppConfig, LoggingConfig, PaginationConfig, PaymentsConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
pub use observability::init_tracing;
pub use payments::{PaymentGateway, PaymentService};
pub use server::{ServerBuilder, VendorhubServer, build_app, create_store};
pub use state::AppState;
