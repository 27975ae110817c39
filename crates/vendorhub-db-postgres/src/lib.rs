//! PostgreSQL storage backend for VendorHub.
//!
//! Every collection shares one `documents` table; each row holds a JSONB
//! document keyed by `(collection, id)`.

pub mod config;
pub mod error;
mod pool;
pub mod schema;
mod store;

pub use config::PostgresConfig;
pub use error::{PostgresError, Result};
pub use pool::{create_pool, test_connection};
pub use store::PostgresStore;
