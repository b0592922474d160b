use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use spedition_core::{EntityKind, Record, TenantId};

/// A mapped record stamped with its tenant and timestamps, ready to insert.
#[derive(Debug, Clone, Serialize)]
pub struct StampedRecord {
    pub tenant_id: TenantId,
    pub fields: Record,
    pub search_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StampedRecord {
    pub fn stamp(
        tenant_id: TenantId,
        entity: EntityKind,
        fields: Record,
        now: DateTime<Utc>,
    ) -> Self {
        let search_text = search_text(entity, &fields);
        Self {
            tenant_id,
            fields,
            search_text,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Concatenated identity values, lowercased, for substring search.
pub fn search_text(entity: EntityKind, fields: &Record) -> String {
    let mut parts: Vec<String> = Vec::new();
    for name in entity.required_identity_fields() {
        if let Some(value) = fields.get(*name) {
            if !value.is_blank() {
                parts.push(value.render());
            }
        }
    }
    parts.join(" ").to_lowercase()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend cannot take writes at all. Fatal for a run.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
    /// The backend refused these rows; the run continues via fallback.
    #[error("{message}")]
    Rejected {
        message: String,
        code: String,
        retryable: bool,
    },
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Write interface the batch processor drives.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Insert a whole batch in one statement. All-or-nothing: either every
    /// row lands or the error says why the batch was refused.
    async fn insert_batch(
        &self,
        entity: EntityKind,
        records: &[StampedRecord],
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Insert a single record (per-record fallback path).
    async fn insert_one(
        &self,
        entity: EntityKind,
        record: &StampedRecord,
    ) -> Result<Uuid, StoreError>;

    /// Rows currently held for one tenant and entity.
    async fn count(&self, tenant_id: TenantId, entity: EntityKind) -> Result<u64, StoreError>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use spedition_core::FieldValue;

    use super::*;

    #[test]
    fn search_text_joins_identity_fields_only() {
        let mut fields = Record::new();
        fields.insert("first_name".to_string(), FieldValue::Text("Ada".to_string()));
        fields.insert("email".to_string(), FieldValue::Text("Ada@Example.com".to_string()));
        fields.insert("notes".to_string(), FieldValue::Text("IGNORED".to_string()));
        fields.insert("phone".to_string(), FieldValue::Null);

        let text = search_text(EntityKind::Customers, &fields);

        assert_eq!(text, "ada@example.com ada");
        assert!(!text.contains("ignored"));
    }
}
