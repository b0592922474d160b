//! PostgreSQL backend: one tenant-scoped JSONB table per entity kind.
//!
//! Rows are `(id, tenant_id, payload, search_text, created_at, updated_at)`
//! with a per-entity case-insensitive uniqueness key (see migrations).
//! Bulk inserts go through one UNNEST statement so a batch is a single
//! round trip and fails atomically.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use spedition_core::config::StoreConfig;
use spedition_core::{codes, EntityKind, TenantId};

use crate::datastore::{Datastore, StampedRecord, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run migrations.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config
            .pg_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("PG_URL not configured".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await
            .map_err(map_sqlx)?;
        info!("PostgreSQL connected");

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migrations failed: {e}")))?;
        info!("Database migrations applied successfully");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Datastore for PgStore {
    async fn insert_batch(
        &self,
        entity: EntityKind,
        records: &[StampedRecord],
    ) -> Result<Vec<Uuid>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut tenants = Vec::with_capacity(records.len());
        let mut payloads = Vec::with_capacity(records.len());
        let mut search = Vec::with_capacity(records.len());
        let mut created = Vec::with_capacity(records.len());
        let mut updated = Vec::with_capacity(records.len());

        for record in records {
            ids.push(Uuid::new_v4());
            tenants.push(record.tenant_id);
            payloads.push(encode_payload(record)?);
            search.push(record.search_text.clone());
            created.push(record.created_at);
            updated.push(record.updated_at);
        }

        // table_name comes from a closed enum, not user input
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, payload, search_text, created_at, updated_at)
             SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::jsonb[], $4::text[], $5::timestamptz[], $6::timestamptz[])",
            entity.table_name()
        );

        sqlx::query(&sql)
            .bind(&ids)
            .bind(&tenants)
            .bind(&payloads)
            .bind(&search)
            .bind(&created)
            .bind(&updated)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(ids)
    }

    async fn insert_one(
        &self,
        entity: EntityKind,
        record: &StampedRecord,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, payload, search_text, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
            entity.table_name()
        );

        sqlx::query(&sql)
            .bind(id)
            .bind(record.tenant_id)
            .bind(encode_payload(record)?)
            .bind(&record.search_text)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(id)
    }

    async fn count(&self, tenant_id: TenantId, entity: EntityKind) -> Result<u64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE tenant_id = $1",
            entity.table_name()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

fn encode_payload(record: &StampedRecord) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(&record.fields).map_err(|e| StoreError::Rejected {
        message: format!("payload not JSON-encodable: {e}"),
        code: codes::STORE_REJECTED.to_string(),
        retryable: false,
    })
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) => {
            let sqlstate = db.code().map(|c| c.to_string()).unwrap_or_default();
            let (code, retryable) = match sqlstate.as_str() {
                "23505" => (codes::UNIQUE_VIOLATION, false),
                "23502" => (codes::NOT_NULL_VIOLATION, false),
                "23514" => (codes::CHECK_VIOLATION, false),
                // serialization failure / deadlock: same rows may succeed later
                "40001" | "40P01" => (codes::STORE_REJECTED, true),
                _ => (codes::STORE_REJECTED, false),
            };
            StoreError::Rejected {
                message: db.message().to_string(),
                code: code.to_string(),
                retryable,
            }
        }
        _ => StoreError::Unavailable(e.to_string()),
    }
}
