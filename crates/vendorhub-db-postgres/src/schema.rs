//! Schema bootstrap for the document table.

use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

pub const DOCUMENTS_TABLE: &str = "documents";

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        vendor_id TEXT GENERATED ALWAYS AS (body ->> 'vendorId') STORED,
        body JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (collection, id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS documents_vendor_idx ON documents (collection, vendor_id)",
    "CREATE INDEX IF NOT EXISTS documents_body_gin ON documents USING GIN (body jsonb_path_ops)",
];

/// Create the document table and its indexes if missing. Idempotent.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for sql in STATEMENTS {
        sqlx_core::query::query(sql)
            .execute(pool)
            .await
            .map_err(|e| PostgresError::schema(format!("{e} while running: {}", sql.trim())))?;
    }
    info!(table = DOCUMENTS_TABLE, "document schema ready");
    Ok(())
}
