//! In-memory backend with the same constraint semantics as Postgres:
//! per-tenant case-insensitive uniqueness on the entity's key field,
//! all-or-nothing batches. Backs tests and `--dry-run`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use spedition_core::{codes, EntityKind, TenantId};

use crate::datastore::{Datastore, StampedRecord, StoreError};

#[derive(Default)]
struct Shard {
    rows: Vec<(Uuid, StampedRecord)>,
    keys: HashSet<String>,
}

/// Everything behind one mutex; plenty for tests and dry runs.
#[derive(Default)]
pub struct MemStore {
    shards: Mutex<HashMap<(TenantId, EntityKind), Shard>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored records for one tenant and entity, in insertion order.
    pub fn rows(&self, tenant_id: TenantId, entity: EntityKind) -> Vec<StampedRecord> {
        let shards = self.shards.lock().unwrap();
        shards
            .get(&(tenant_id, entity))
            .map(|shard| shard.rows.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }

    fn key_of(entity: EntityKind, record: &StampedRecord) -> Option<String> {
        record
            .fields
            .get(entity.unique_key_field())
            .filter(|v| !v.is_blank())
            .map(|v| v.render().trim().to_lowercase())
    }

    /// All-or-nothing: the conflict check runs over the whole slice before
    /// anything is written, matching a single INSERT statement.
    fn try_insert(
        shards: &mut HashMap<(TenantId, EntityKind), Shard>,
        entity: EntityKind,
        records: &[StampedRecord],
    ) -> Result<Vec<Uuid>, StoreError> {
        let mut fresh: HashSet<(TenantId, String)> = HashSet::new();
        for record in records {
            let Some(key) = Self::key_of(entity, record) else {
                continue;
            };
            let taken = shards
                .get(&(record.tenant_id, entity))
                .map_or(false, |shard| shard.keys.contains(&key));
            if taken || !fresh.insert((record.tenant_id, key.clone())) {
                return Err(StoreError::Rejected {
                    message: format!(
                        "duplicate key value violates unique constraint on {}.{}: \"{}\"",
                        entity.table_name(),
                        entity.unique_key_field(),
                        key
                    ),
                    code: codes::UNIQUE_VIOLATION.to_string(),
                    retryable: false,
                });
            }
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let shard = shards.entry((record.tenant_id, entity)).or_default();
            if let Some(key) = Self::key_of(entity, record) {
                shard.keys.insert(key);
            }
            let id = Uuid::new_v4();
            shard.rows.push((id, record.clone()));
            ids.push(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl Datastore for MemStore {
    async fn insert_batch(
        &self,
        entity: EntityKind,
        records: &[StampedRecord],
    ) -> Result<Vec<Uuid>, StoreError> {
        let mut shards = self.shards.lock().unwrap();
        Self::try_insert(&mut shards, entity, records)
    }

    async fn insert_one(
        &self,
        entity: EntityKind,
        record: &StampedRecord,
    ) -> Result<Uuid, StoreError> {
        let mut shards = self.shards.lock().unwrap();
        Self::try_insert(&mut shards, entity, std::slice::from_ref(record)).map(|ids| ids[0])
    }

    async fn count(&self, tenant_id: TenantId, entity: EntityKind) -> Result<u64, StoreError> {
        let shards = self.shards.lock().unwrap();
        Ok(shards
            .get(&(tenant_id, entity))
            .map_or(0, |shard| shard.rows.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
