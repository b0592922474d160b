//! Adaptive batch processor: bulk writes with per-record isolation.
//!
//! One run walks the mapped records in input order, bulk-inserting a batch
//! at a time. A rejected batch is retried record by record so a single bad
//! row never discards its neighbors; the only error that stops the loop is
//! the datastore going away entirely.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use spedition_core::config::BatchConfig;
use spedition_core::{EntityKind, ErrorSeverity, ImportError, Record, TenantId};
use spedition_store::{Datastore, StampedRecord, StoreError};

use crate::batch::BatchRunState;
use crate::error::PipelineError;

/// Progress callback: (records processed so far, total records).
///
/// Invoked after every batch. Must be cheap; the loop calls it inline.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Aggregated outcome of one processing run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records attempted (equals the input length unless cancelled).
    pub total_processed: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Per-record failures in input order, indices relative to the input.
    pub errors: Vec<ImportError>,
    /// Batch size the sizing loop ended on.
    pub final_batch_size: usize,
    /// True when the run stopped at a cancellation check.
    pub cancelled: bool,
}

/// Drives batched writes against one [`Datastore`].
///
/// Holds no per-run state; every [`process`](Self::process) call owns a
/// fresh [`BatchRunState`], so one processor can serve sequential runs.
pub struct BatchProcessor {
    store: Arc<dyn Datastore>,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(store: Arc<dyn Datastore>, config: BatchConfig) -> Self {
        Self { store, config }
    }

    /// Insert all records for one tenant, adapting batch size as it goes.
    ///
    /// Cancellation is honored between batches only; records of a batch in
    /// flight either all land (bulk) or are settled row by row (fallback)
    /// before the token is looked at again.
    pub async fn process(
        &self,
        records: Vec<Record>,
        entity: EntityKind,
        tenant_id: TenantId,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, PipelineError> {
        let total = records.len();
        let mut state = BatchRunState::new(self.config.clone());
        let mut report = BatchReport::default();
        let mut index = 0;
        let mut batch_no = 0;

        while index < total {
            if cancel.is_cancelled() {
                warn!(
                    entity = %entity,
                    processed = index,
                    total,
                    "import cancelled, keeping committed batches"
                );
                report.cancelled = true;
                break;
            }

            let size = state.current_size().min(total - index);
            let now = Utc::now();
            let stamped: Vec<StampedRecord> = records[index..index + size]
                .iter()
                .map(|fields| StampedRecord::stamp(tenant_id, entity, fields.clone(), now))
                .collect();

            let started = Instant::now();
            let (successes, mut errors) = match self.store.insert_batch(entity, &stamped).await {
                Ok(_) => (size, Vec::new()),
                Err(err @ StoreError::Unavailable(_)) => return Err(err.into()),
                Err(StoreError::Rejected { message, .. }) => {
                    debug!(
                        entity = %entity,
                        batch = batch_no,
                        size,
                        reason = %message,
                        "bulk insert rejected, isolating rows"
                    );
                    self.insert_individually(entity, &stamped, index).await?
                }
            };
            let duration = started.elapsed();

            report.success_count += successes;
            report.failure_count += errors.len();
            report.errors.append(&mut errors);
            index += size;
            report.total_processed = index;

            state.observe(successes as f64 / size as f64, duration);
            debug!(
                entity = %entity,
                batch = batch_no,
                size,
                successes,
                duration_ms = duration.as_millis() as u64,
                next_size = state.current_size(),
                "batch settled"
            );

            if let Some(callback) = progress {
                callback(index, total);
            }
            batch_no += 1;
        }

        report.final_batch_size = state.current_size();
        Ok(report)
    }

    /// Per-record fallback after a rejected bulk insert.
    ///
    /// `base_index` is the batch's offset into the original input, so error
    /// indices always point at source rows.
    async fn insert_individually(
        &self,
        entity: EntityKind,
        batch: &[StampedRecord],
        base_index: usize,
    ) -> Result<(usize, Vec<ImportError>), PipelineError> {
        let mut successes = 0;
        let mut errors = Vec::new();

        for (offset, record) in batch.iter().enumerate() {
            match self.store.insert_one(entity, record).await {
                Ok(_) => successes += 1,
                Err(err @ StoreError::Unavailable(_)) => return Err(err.into()),
                Err(StoreError::Rejected {
                    message,
                    code,
                    retryable,
                }) => {
                    errors.push(ImportError {
                        record_index: base_index + offset,
                        payload: record.fields.clone(),
                        message,
                        code,
                        severity: ErrorSeverity::Error,
                        retryable,
                    });
                }
            }
        }

        Ok((successes, errors))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use spedition_core::{codes, FieldValue};
    use spedition_store::MemStore;

    use super::*;

    fn customer(email: &str) -> Record {
        let mut record = Record::new();
        record.insert("email".to_string(), FieldValue::Text(email.to_string()));
        record.insert(
            "first_name".to_string(),
            FieldValue::Text("Test".to_string()),
        );
        record
    }

    fn customers(n: usize) -> Vec<Record> {
        (0..n).map(|i| customer(&format!("c{i}@example.com"))).collect()
    }

    fn config(initial: usize, min: usize, max: usize) -> BatchConfig {
        BatchConfig {
            initial_size: initial,
            min_size: min,
            max_size: max,
            ..BatchConfig::default()
        }
    }

    /// Counts insert_one calls on top of a real MemStore.
    struct CountingStore {
        inner: MemStore,
        singles: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemStore::new(),
                singles: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Datastore for CountingStore {
        async fn insert_batch(
            &self,
            entity: EntityKind,
            records: &[StampedRecord],
        ) -> Result<Vec<Uuid>, StoreError> {
            self.inner.insert_batch(entity, records).await
        }

        async fn insert_one(
            &self,
            entity: EntityKind,
            record: &StampedRecord,
        ) -> Result<Uuid, StoreError> {
            self.singles.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_one(entity, record).await
        }

        async fn count(&self, tenant_id: TenantId, entity: EntityKind) -> Result<u64, StoreError> {
            self.inner.count(tenant_id, entity).await
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            self.inner.health_check().await
        }
    }

    /// Store whose bulk path always rejects and whose single path dies.
    struct SickStore;

    #[async_trait]
    impl Datastore for SickStore {
        async fn insert_batch(
            &self,
            _entity: EntityKind,
            _records: &[StampedRecord],
        ) -> Result<Vec<Uuid>, StoreError> {
            Err(StoreError::Rejected {
                message: "constraint violated".to_string(),
                code: codes::STORE_REJECTED.to_string(),
                retryable: false,
            })
        }

        async fn insert_one(
            &self,
            _entity: EntityKind,
            _record: &StampedRecord,
        ) -> Result<Uuid, StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }

        async fn count(&self, _tenant_id: TenantId, _entity: EntityKind) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }
    }

    /// Store that is down from the start.
    struct DeadStore;

    #[async_trait]
    impl Datastore for DeadStore {
        async fn insert_batch(
            &self,
            _entity: EntityKind,
            _records: &[StampedRecord],
        ) -> Result<Vec<Uuid>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn insert_one(
            &self,
            _entity: EntityKind,
            _record: &StampedRecord,
        ) -> Result<Uuid, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn count(&self, _tenant_id: TenantId, _entity: EntityKind) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_clean_run_never_touches_the_fallback_path() {
        let store = Arc::new(CountingStore::new());
        let processor = BatchProcessor::new(store.clone(), config(10, 1, 50));
        let tenant = Uuid::new_v4();

        let report = processor
            .process(
                customers(25),
                EntityKind::Customers,
                tenant,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.success_count, 25);
        assert_eq!(report.failure_count, 0);
        assert_eq!(report.total_processed, 25);
        assert!(report.errors.is_empty());
        assert!(!report.cancelled);
        assert_eq!(store.singles.load(Ordering::SeqCst), 0);
        assert_eq!(store.count(tenant, EntityKind::Customers).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_rejected_batch_isolates_the_bad_row() {
        let store = Arc::new(CountingStore::new());
        let processor = BatchProcessor::new(store.clone(), config(10, 1, 50));
        let tenant = Uuid::new_v4();

        let mut records = customers(3);
        records[1] = customer("c0@example.com"); // duplicate of row 0

        let report = processor
            .process(
                records,
                EntityKind::Customers,
                tenant,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.success_count + report.failure_count, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].record_index, 1);
        assert_eq!(report.errors[0].code, codes::UNIQUE_VIOLATION);
        assert!(!report.errors[0].retryable);
        assert_eq!(store.count(tenant, EntityKind::Customers).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_error_indices_stay_global_across_batches() {
        let store = Arc::new(CountingStore::new());
        let processor = BatchProcessor::new(store.clone(), config(2, 1, 2));
        let tenant = Uuid::new_v4();

        let mut records = customers(4);
        records[3] = customer("c0@example.com"); // collides with batch 1

        let report = processor
            .process(
                records,
                EntityKind::Customers,
                tenant,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.success_count, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].record_index, 3);
    }

    #[tokio::test]
    async fn test_batch_of_one_failing_is_one_error() {
        let store = Arc::new(CountingStore::new());
        let processor = BatchProcessor::new(store.clone(), config(1, 1, 1));
        let tenant = Uuid::new_v4();

        let first = processor
            .process(
                vec![customer("dup@example.com")],
                EntityKind::Customers,
                tenant,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(first.success_count, 1);

        let second = processor
            .process(
                vec![customer("dup@example.com")],
                EntityKind::Customers,
                tenant,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(second.success_count, 0);
        assert_eq!(second.failure_count, 1);
        assert_eq!(second.errors.len(), 1);
        assert_eq!(second.errors[0].record_index, 0);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_reaches_total() {
        let store = Arc::new(CountingStore::new());
        let processor = BatchProcessor::new(store, config(10, 1, 50));

        let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |done, total| {
            sink.lock().unwrap().push((done, total));
        });

        processor
            .process(
                customers(35),
                EntityKind::Customers,
                Uuid::new_v4(),
                Some(&progress),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let calls = seen.lock().unwrap();
        assert!(!calls.is_empty());
        for pair in calls.windows(2) {
            assert!(pair[1].0 > pair[0].0, "progress went backwards: {calls:?}");
        }
        assert_eq!(calls.last(), Some(&(35, 35)));
        assert!(calls.iter().all(|(_, total)| *total == 35));
    }

    #[tokio::test]
    async fn test_cancellation_keeps_committed_batches() {
        let store = Arc::new(CountingStore::new());
        let processor = BatchProcessor::new(store.clone(), config(10, 1, 10));
        let tenant = Uuid::new_v4();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let progress: ProgressFn = Arc::new(move |_, _| trigger.cancel());

        let report = processor
            .process(
                customers(30),
                EntityKind::Customers,
                tenant,
                Some(&progress),
                &cancel,
            )
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.total_processed, 10);
        assert_eq!(report.success_count, 10);
        assert_eq!(store.count(tenant, EntityKind::Customers).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_unavailable_store_aborts_the_run() {
        let processor = BatchProcessor::new(Arc::new(DeadStore), config(10, 1, 50));

        let result = processor
            .process(
                customers(5),
                EntityKind::Customers,
                Uuid::new_v4(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_during_fallback_aborts_too() {
        let processor = BatchProcessor::new(Arc::new(SickStore), config(10, 1, 50));

        let result = processor
            .process(
                customers(5),
                EntityKind::Customers,
                Uuid::new_v4(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_batch_size_grows_on_clean_fast_batches() {
        let store = Arc::new(CountingStore::new());
        let processor = BatchProcessor::new(store, BatchConfig::default());

        let report = processor
            .process(
                customers(1_000),
                EntityKind::Customers,
                Uuid::new_v4(),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.success_count, 1_000);
        assert_eq!(report.failure_count, 0);
        assert!(report.final_batch_size >= 100);
    }
}
