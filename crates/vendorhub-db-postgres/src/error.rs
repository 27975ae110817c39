//! Error types for the PostgreSQL storage backend.

use sqlx_core::error::Error as SqlxError;
use vendorhub_storage::StorageError;

/// PostgreSQL error code for unique violations (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Errors specific to the PostgreSQL storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Connection(#[from] SqlxError),

    #[error("Schema error: {message}")]
    Schema { message: String },
}

impl PostgresError {
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(SqlxError::PoolTimedOut | SqlxError::PoolClosed) => {
                StorageError::connection_error("connection pool unavailable")
            }
            PostgresError::Connection(SqlxError::Io(e)) => StorageError::connection_error(e.to_string()),
            PostgresError::Connection(e) => StorageError::internal(e.to_string()),
            PostgresError::Schema { message } => StorageError::internal(message),
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;
