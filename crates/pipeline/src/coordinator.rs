//! Run coordinator: Detecting → Validating → (Rejected | Processing) → Completed.
//!
//! One [`run_import`](ImportCoordinator::run_import) call is one run. The
//! coordinator never retries on its own; a caller may re-run the same rows
//! and the datastore's uniqueness constraints decide what that means.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use spedition_classify::{validate_mappings, SchemaClassifier};
use spedition_core::config::BatchConfig;
use spedition_core::{
    Classification, EntityKind, FileMeta, ImportError, IssueSeverity, QualityIssue, Record,
    SourcePlatform, TenantId,
};
use spedition_store::Datastore;

use crate::error::PipelineError;
use crate::processor::{BatchProcessor, ProgressFn};
use crate::transform::apply_mappings;

/// Rows handed to the classifier for sampling and quality scanning.
const SAMPLE_ROWS: usize = 100;

/// Where a finished run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Validation failed; nothing was written.
    Rejected,
    Completed,
    CompletedWithErrors,
    Cancelled,
}

/// The caller-facing report for one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRunResult {
    pub status: RunStatus,
    pub classification: Classification,
    /// Populated only for [`RunStatus::Rejected`].
    pub validation_errors: Vec<String>,
    pub total_processed: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Per-record failures in input order.
    pub errors: Vec<ImportError>,
    pub quality_issues: Vec<QualityIssue>,
    pub duration_ms: u64,
}

/// Per-run knobs beyond the raw input.
pub struct RunOptions {
    pub meta: FileMeta,
    /// Trust the caller over the classifier for the source platform.
    pub platform: Option<SourcePlatform>,
    /// Trust the caller over the classifier for the entity kind.
    pub entity: Option<EntityKind>,
    pub progress: Option<ProgressFn>,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new(meta: FileMeta) -> Self {
        Self {
            meta,
            platform: None,
            entity: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Ties classifier, validator, transforms and the batch processor into one
/// caller-facing entry point.
pub struct ImportCoordinator {
    classifier: SchemaClassifier,
    store: Arc<dyn Datastore>,
    batch: BatchConfig,
}

impl ImportCoordinator {
    pub fn new(
        classifier: SchemaClassifier,
        store: Arc<dyn Datastore>,
        batch: BatchConfig,
    ) -> Self {
        Self {
            classifier,
            store,
            batch,
        }
    }

    /// Run one import end to end.
    ///
    /// Returns `Err` only for whole-run failures (bad input, datastore
    /// gone); a rejected mapping plan is a normal `Ok` result carrying the
    /// validation errors and zero writes.
    pub async fn run_import(
        &self,
        rows: Vec<Record>,
        headers: &[String],
        tenant_id: TenantId,
        opts: RunOptions,
    ) -> Result<ImportRunResult, PipelineError> {
        let started = Instant::now();

        if rows.is_empty() {
            return Err(PipelineError::InvalidInput("no rows to import".to_string()));
        }

        // Detecting
        info!(
            tenant = %tenant_id,
            file = %opts.meta.file_name,
            rows = rows.len(),
            "import run: detecting schema"
        );
        let sample: Vec<Record> = rows.iter().take(SAMPLE_ROWS).cloned().collect();
        let mut classification = self.classifier.classify(headers, &sample, &opts.meta).await?;
        apply_overrides(&mut classification, &opts);
        info!(
            platform = %classification.platform,
            entity = %classification.entity,
            confidence = classification.confidence,
            mappings = classification.mappings.len(),
            "schema detected"
        );

        // Validating
        let validation = validate_mappings(&classification);
        if !validation.valid {
            warn!(
                tenant = %tenant_id,
                errors = ?validation.errors,
                "import run rejected by mapping validation"
            );
            let quality_issues = classification.quality_issues.clone();
            return Ok(ImportRunResult {
                status: RunStatus::Rejected,
                classification,
                validation_errors: validation.errors,
                total_processed: 0,
                success_count: 0,
                failure_count: 0,
                errors: Vec::new(),
                quality_issues,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        for issue in classification
            .quality_issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Critical)
        {
            warn!(
                field = %issue.field,
                count = issue.count,
                suggestion = %issue.suggestion,
                "critical data quality issue"
            );
        }

        // Processing
        let mapped: Vec<Record> = rows
            .iter()
            .map(|row| apply_mappings(row, &classification.mappings))
            .collect();
        let processor = BatchProcessor::new(self.store.clone(), self.batch.clone());
        let report = processor
            .process(
                mapped,
                classification.entity,
                tenant_id,
                opts.progress.as_ref(),
                &opts.cancel,
            )
            .await?;

        // Completed
        let status = if report.cancelled {
            RunStatus::Cancelled
        } else if report.failure_count > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            tenant = %tenant_id,
            status = ?status,
            success = report.success_count,
            failed = report.failure_count,
            duration_ms,
            "import run finished"
        );

        let quality_issues = classification.quality_issues.clone();
        Ok(ImportRunResult {
            status,
            classification,
            validation_errors: Vec::new(),
            total_processed: report.total_processed,
            success_count: report.success_count,
            failure_count: report.failure_count,
            errors: report.errors,
            quality_issues,
            duration_ms,
        })
    }
}

/// Caller-supplied platform/entity beat whatever was detected. An entity
/// override re-derives which mappings count as required.
fn apply_overrides(classification: &mut Classification, opts: &RunOptions) {
    if let Some(platform) = opts.platform {
        classification.platform = platform;
    }
    if let Some(entity) = opts.entity {
        if entity != classification.entity {
            classification.entity = entity;
            let identity = entity.required_identity_fields();
            for mapping in &mut classification.mappings {
                mapping.required = identity.contains(&mapping.target_field.as_str());
            }
            classification.reasoning =
                format!("{} (entity overridden by caller)", classification.reasoning);
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use spedition_core::FieldValue;
    use spedition_store::MemStore;

    use super::*;

    fn meta(rows: usize) -> FileMeta {
        FileMeta {
            file_name: "export.csv".to_string(),
            file_size: 4_096,
            row_count: rows,
        }
    }

    fn job_headers() -> Vec<String> {
        ["jobNumber", "tenantId", "modifiedOn", "customerName"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn job_rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut row = Record::new();
                row.insert("jobNumber".to_string(), FieldValue::Text(format!("J-{i:04}")));
                row.insert("tenantId".to_string(), FieldValue::Text("t-1".to_string()));
                row.insert(
                    "modifiedOn".to_string(),
                    FieldValue::Text("2024-01-15".to_string()),
                );
                row.insert(
                    "customerName".to_string(),
                    FieldValue::Text(format!("Customer {i}")),
                );
                row
            })
            .collect()
    }

    fn coordinator(store: Arc<MemStore>) -> ImportCoordinator {
        ImportCoordinator::new(
            SchemaClassifier::heuristic_only(),
            store,
            spedition_core::config::BatchConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_heuristic_run_completes_against_known_signature() {
        let store = Arc::new(MemStore::new());
        let coordinator = coordinator(store.clone());
        let tenant = Uuid::new_v4();

        let result = coordinator
            .run_import(job_rows(20), &job_headers(), tenant, RunOptions::new(meta(20)))
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.classification.platform, SourcePlatform::ServiceTitan);
        assert_eq!(result.classification.entity, EntityKind::Jobs);
        assert_eq!(result.success_count, 20);
        assert_eq!(result.failure_count, 0);
        assert!(result.validation_errors.is_empty());
        assert_eq!(store.count(tenant, EntityKind::Jobs).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_unmappable_headers_reject_without_writing() {
        let store = Arc::new(MemStore::new());
        let coordinator = coordinator(store.clone());
        let tenant = Uuid::new_v4();

        let headers: Vec<String> = vec!["colour".to_string(), "shape".to_string()];
        let mut row = Record::new();
        row.insert("colour".to_string(), FieldValue::Text("red".to_string()));
        row.insert("shape".to_string(), FieldValue::Text("round".to_string()));

        let result = coordinator
            .run_import(vec![row], &headers, tenant, RunOptions::new(meta(1)))
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Rejected);
        assert!(!result.validation_errors.is_empty());
        assert_eq!(result.total_processed, 0);
        let entity = result.classification.entity;
        assert_eq!(store.count(tenant, entity).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_is_a_hard_error() {
        let store = Arc::new(MemStore::new());
        let coordinator = coordinator(store);

        let result = coordinator
            .run_import(Vec::new(), &job_headers(), Uuid::new_v4(), RunOptions::new(meta(0)))
            .await;

        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_entity_override_recomputes_required_flags() {
        let store = Arc::new(MemStore::new());
        let coordinator = coordinator(store.clone());
        let tenant = Uuid::new_v4();

        // Job-shaped file, but the caller insists these are customers.
        let mut opts = RunOptions::new(meta(5));
        opts.entity = Some(EntityKind::Customers);
        opts.platform = Some(SourcePlatform::Generic);

        let mut rows = Vec::new();
        for i in 0..5 {
            let mut row = Record::new();
            row.insert(
                "email".to_string(),
                FieldValue::Text(format!("c{i}@example.com")),
            );
            row.insert("jobNumber".to_string(), FieldValue::Text(format!("J-{i}")));
            rows.push(row);
        }
        let headers = vec!["email".to_string(), "jobNumber".to_string()];

        let result = coordinator.run_import(rows, &headers, tenant, opts).await.unwrap();

        assert_eq!(result.classification.entity, EntityKind::Customers);
        assert_eq!(result.classification.platform, SourcePlatform::Generic);
        let email = result
            .classification
            .mappings
            .iter()
            .find(|m| m.target_field == "email")
            .unwrap();
        assert!(email.required);
        assert_eq!(store.count(tenant, EntityKind::Customers).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_writes_nothing() {
        let store = Arc::new(MemStore::new());
        let coordinator = coordinator(store.clone());
        let tenant = Uuid::new_v4();

        let mut opts = RunOptions::new(meta(20));
        opts.cancel = CancellationToken::new();
        opts.cancel.cancel();

        let result = coordinator
            .run_import(job_rows(20), &job_headers(), tenant, opts)
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Cancelled);
        assert_eq!(result.total_processed, 0);
        assert_eq!(store.count(tenant, EntityKind::Jobs).await.unwrap(), 0);
    }
}
