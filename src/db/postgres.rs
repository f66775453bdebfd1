use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::store::{Collection, Document, Filter, Record, RecordStore};
use crate::error::StoreError;

/// Document store on PostgreSQL: one `(id, seq, doc JSONB)` table per
/// collection, with a unique expression index on each collection's key.
pub struct PgRecordStore {
    pool: Arc<PgPool>,
}

type Row = (Uuid, Json<Document>);

fn into_record((id, Json(document)): Row) -> Record {
    Record { id, document }
}

impl PgRecordStore {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("Store schema is up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Record>, StoreError> {
        let table = collection.name();
        let row = match filter {
            Filter::Id(id) => {
                sqlx::query_as::<_, Row>(&format!("SELECT id, doc FROM {table} WHERE id = $1"))
                    .bind(id)
                    .fetch_optional(self.pool.as_ref())
                    .await?
            }
            Filter::Field { name, value } => {
                sqlx::query_as::<_, Row>(&format!(
                    "SELECT id, doc FROM {table} WHERE doc -> $1 = $2 ORDER BY seq LIMIT 1"
                ))
                .bind(name)
                .bind(Json(value))
                .fetch_optional(self.pool.as_ref())
                .await?
            }
        };

        Ok(row.map(into_record))
    }

    async fn find_all(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let rows = sqlx::query_as::<_, Row>(&format!(
            "SELECT id, doc FROM {} ORDER BY seq",
            collection.name()
        ))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(&format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2)",
            collection.name()
        ))
        .bind(id)
        .bind(Json(Value::Object(document)))
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return collection.duplicate();
                }
            }
            StoreError::Unavailable(e.to_string())
        })?;

        Ok(id)
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let table = collection.name();
        let result = match filter {
            Filter::Id(id) => {
                sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
                    .bind(id)
                    .execute(self.pool.as_ref())
                    .await?
            }
            Filter::Field { name, value } => {
                sqlx::query(&format!(
                    "DELETE FROM {table} WHERE id IN \
                     (SELECT id FROM {table} WHERE doc -> $1 = $2 ORDER BY seq LIMIT 1)"
                ))
                .bind(name)
                .bind(Json(value))
                .execute(self.pool.as_ref())
                .await?
            }
        };

        Ok(result.rows_affected())
    }
}
