use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx_core::types::Json;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};
use vendorhub_storage::{
    Document, DocumentStore, FilterOp, FindResult, Query, StorageError, document_id,
};

use crate::config::PostgresConfig;
use crate::error::{PG_UNIQUE_VIOLATION, PostgresError, has_pg_error_code};
use crate::pool::{create_pool, test_connection};
use crate::schema::ensure_schema;

/// JSONB document store.
///
/// Equality filters are pushed into SQL as a containment (`@>`) predicate;
/// the remaining filters, search, sort and window run in process.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, verify the connection and create the schema.
    pub async fn connect(config: &PostgresConfig) -> crate::Result<Self> {
        let pool = create_pool(config).await?;
        test_connection(&pool).await?;
        ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn extract_id(doc: &Document) -> Result<String, StorageError> {
    if !doc.is_object() {
        return Err(StorageError::invalid_document("document must be a JSON object"));
    }
    document_id(doc)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| StorageError::invalid_document("missing string id"))
}

/// Build a JSONB containment pattern from the query's equality filters.
fn containment(query: &Query) -> Value {
    let mut root = Map::new();
    for filter in &query.filters {
        let FilterOp::Eq(expected) = &filter.op else {
            continue;
        };
        let mut keys = filter.field.split('.').peekable();
        let mut node = &mut root;
        while let Some(key) = keys.next() {
            if keys.peek().is_none() {
                node.insert(key.to_string(), expected.clone());
                break;
            }
            let child = node
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match child {
                Value::Object(map) => node = map,
                _ => break,
            }
        }
    }
    Value::Object(root)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    #[instrument(skip(self, doc))]
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StorageError> {
        let id = extract_id(&doc)?;
        let result = sqlx_core::query::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&doc))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(doc),
            Err(e) if has_pg_error_code(&e, PG_UNIQUE_VIOLATION) => {
                Err(StorageError::already_exists(collection, id))
            }
            Err(e) => Err(PostgresError::from(e).into()),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let row: Option<(Json<Value>,)> = sqlx_core::query_as::query_as(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(row.map(|(Json(body),)| body))
    }

    #[instrument(skip(self, doc))]
    async fn replace(&self, collection: &str, doc: Document) -> Result<Document, StorageError> {
        let id = extract_id(&doc)?;
        let done = sqlx_core::query::query(
            "UPDATE documents SET body = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&doc))
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        if done.rows_affected() == 0 {
            return Err(StorageError::not_found(collection, id));
        }
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let done = sqlx_core::query::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(done.rows_affected() > 0)
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<FindResult, StorageError> {
        let pattern = containment(query);
        let rows: Vec<(Json<Value>,)> = sqlx_core::query_as::query_as(
            "SELECT body FROM documents WHERE collection = $1 AND body @> $2",
        )
        .bind(collection)
        .bind(Json(&pattern))
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        debug!(collection, fetched = rows.len(), "postgres find");
        Ok(query.apply(rows.into_iter().map(|(Json(body),)| body)))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        test_connection(&self.pool).await.map_err(Into::into)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
