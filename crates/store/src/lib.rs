//! Datastore backends for imported records.
//!
//! One trait, two backends: [`PgStore`] (tenant-scoped JSONB tables, one per
//! entity kind) and [`MemStore`] (same constraint semantics, no Postgres),
//! used by tests and dry runs.

pub mod datastore;
pub mod memory;
pub mod postgres;

pub use datastore::{search_text, Datastore, StampedRecord, StoreError};
pub use memory::MemStore;
pub use postgres::PgStore;
