//! import-worker — one-shot bulk import of an exported file.
//!
//! Reads a CSV or JSON-array export, classifies its schema (LLM oracle when
//! configured, deterministic heuristics otherwise), validates the mapping
//! plan, and drives the adaptive batch processor against Postgres — or the
//! in-memory store for dry runs.
//!
//! The final report is printed as JSON on stdout and appended to
//! `<data-dir>/import/runs.jsonl`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use spedition_classify::SchemaClassifier;
use spedition_core::config::{load_dotenv, Config};
use spedition_core::{record_from_json, EntityKind, FieldValue, FileMeta, Record, SourcePlatform, TenantId};
use spedition_pipeline::coordinator::{ImportCoordinator, ImportRunResult, RunOptions};
use spedition_pipeline::processor::ProgressFn;
use spedition_store::{Datastore, MemStore, PgStore};

// ── CLI ─────────────────────────────────────────────────────────────

/// Bulk import worker — classify, validate and load one exported file.
#[derive(Parser, Debug)]
#[command(name = "import-worker", version, about)]
struct Cli {
    /// CSV or JSON-array file to import.
    file: PathBuf,

    /// Tenant the imported records belong to.
    #[arg(long)]
    tenant: Uuid,

    /// Force the entity kind instead of trusting the classifier.
    #[arg(long)]
    entity: Option<String>,

    /// Force the source platform instead of trusting the classifier.
    #[arg(long)]
    platform: Option<String>,

    /// Import into the in-memory store; Postgres is never touched.
    #[arg(long)]
    dry_run: bool,

    /// Skip the LLM oracle even when one is configured.
    #[arg(long)]
    no_oracle: bool,

    /// Directory run summaries are appended under (import/runs.jsonl).
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if cli.no_oracle {
        config.classifier.provider = "off".to_string();
    }
    config
        .batch
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid batch config: {e}"))?;
    config.log_summary();

    let entity_override = cli
        .entity
        .as_deref()
        .map(|s| EntityKind::parse(s).with_context(|| format!("unknown entity kind '{s}'")))
        .transpose()?;
    let platform_override = cli
        .platform
        .as_deref()
        .map(|s| SourcePlatform::parse(s).with_context(|| format!("unknown platform '{s}'")))
        .transpose()?;

    let (headers, rows) = read_rows(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    info!(
        file = %cli.file.display(),
        rows = rows.len(),
        columns = headers.len(),
        "input parsed"
    );

    let store: Arc<dyn Datastore> = if cli.dry_run {
        warn!("dry run: records go to the in-memory store only");
        Arc::new(MemStore::new())
    } else if config.store.is_configured() {
        Arc::new(PgStore::connect(&config.store).await?)
    } else {
        warn!("PG_URL not set, falling back to the in-memory store");
        Arc::new(MemStore::new())
    };
    store.health_check().await?;

    let classifier = SchemaClassifier::from_config(&config.classifier);
    let coordinator = ImportCoordinator::new(classifier, store, config.batch.clone());

    let file_size = std::fs::metadata(&cli.file).map(|m| m.len()).unwrap_or(0);
    let meta = FileMeta {
        file_name: cli
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| cli.file.display().to_string()),
        file_size,
        row_count: rows.len(),
    };

    let mut opts = RunOptions::new(meta);
    opts.entity = entity_override;
    opts.platform = platform_override;
    let progress: ProgressFn = Arc::new(|done, total| {
        info!(processed = done, total, "import progress");
    });
    opts.progress = Some(progress);

    let result = coordinator
        .run_import(rows, &headers, cli.tenant, opts)
        .await?;

    append_run_log(&cli.data_dir, &cli.file, cli.tenant, &result);
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

// ── Input parsing ───────────────────────────────────────────────────

/// Read a CSV (header row required) or a JSON array of flat objects into
/// header names plus records. Headers come from the CSV header row or the
/// first JSON object's keys.
fn read_rows(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Record>)> {
    let json_input = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_input {
        read_json_rows(path)
    } else {
        read_csv_rows(path)
    }
}

fn read_csv_rows(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Record>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for entry in reader.records() {
        let record = entry?;
        let mut row = Record::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            let field = if value.trim().is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Text(value.to_string())
            };
            row.insert(header.clone(), field);
        }
        rows.push(row);
    }
    Ok((headers, rows))
}

fn read_json_rows(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Record>)> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let serde_json::Value::Array(items) = value else {
        anyhow::bail!("expected a top-level JSON array of objects");
    };

    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    for item in &items {
        let serde_json::Value::Object(obj) = item else {
            anyhow::bail!("expected every array element to be an object");
        };
        if headers.is_empty() {
            headers = obj.keys().cloned().collect();
        }
        rows.push(record_from_json(obj));
    }
    Ok((headers, rows))
}

// ── JSONL run log ───────────────────────────────────────────────────

/// One line per finished run, equivalent to the stdout report minus the
/// per-record noise.
#[derive(Serialize)]
struct RunLogEntry {
    id: Uuid,
    tenant_id: TenantId,
    file: String,
    status: spedition_pipeline::RunStatus,
    total_processed: usize,
    success_count: usize,
    failure_count: usize,
    validation_errors: Vec<String>,
    duration_ms: u64,
    finished_at: DateTime<Utc>,
}

/// Append a run summary to `<data-dir>/import/runs.jsonl`. Best effort:
/// logging failures warn, never fail the import.
fn append_run_log(data_dir: &Path, file: &Path, tenant_id: TenantId, result: &ImportRunResult) {
    let log_dir = data_dir.join("import");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        warn!(error = %e, "failed to create import log directory");
        return;
    }

    let log_path = log_dir.join("runs.jsonl");
    let entry = RunLogEntry {
        id: Uuid::new_v4(),
        tenant_id,
        file: file.display().to_string(),
        status: result.status,
        total_processed: result.total_processed,
        success_count: result.success_count,
        failure_count: result.failure_count,
        validation_errors: result.validation_errors.clone(),
        duration_ms: result.duration_ms,
        finished_at: Utc::now(),
    };

    let json_line = match serde_json::to_string(&entry) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "failed to serialize run log entry");
            return;
        }
    };

    use std::io::Write;
    let mut log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, path = %log_path.display(), "failed to open run log");
            return;
        }
    };

    if let Err(e) = writeln!(log_file, "{}", json_line) {
        warn!(error = %e, "failed to write run log entry");
    }
}
