use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub store: StoreConfig,
    pub batch: BatchConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            classifier: ClassifierConfig::from_env(),
            store: StoreConfig::from_env(),
            batch: BatchConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  classifier: provider={}, timeout={}s",
            self.classifier.provider,
            self.classifier.timeout_secs
        );
        tracing::info!(
            "  store:      pg={}, max_connections={}",
            if self.store.pg_url.is_some() { "configured" } else { "(none)" },
            self.store.max_connections
        );
        tracing::info!(
            "  batch:      initial={}, min={}, max={}",
            self.batch.initial_size,
            self.batch.min_size,
            self.batch.max_size
        );
    }
}

// ── Classifier / LLM oracle ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// "openai", "anthropic", "ollama", or "off" (heuristics only).
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Oracle calls past this deadline fall back to heuristics.
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        Self {
            provider: env_or("CLASSIFIER_PROVIDER", "off"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o"),
            openai_base_url: env_opt("OPENAI_BASE_URL"),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            anthropic_model: env_or("ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            ollama_url: env_or("OLLAMA_URL", "http://localhost:11434"),
            ollama_model: env_or("OLLAMA_MODEL", "llama3.2"),
            temperature: env_or("CLASSIFIER_TEMPERATURE", "0.1").parse().unwrap_or(0.1),
            max_tokens: env_u32("CLASSIFIER_MAX_TOKENS", 2048),
            timeout_secs: env_u64("CLASSIFIER_TIMEOUT_SECS", 20),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "anthropic" | "claude" => self.anthropic_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Full Postgres URL; when unset the worker runs against the in-memory store.
    pub pg_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            pg_url: env_opt("PG_URL").or_else(|| env_opt("DATABASE_URL")),
            max_connections: env_u32("PG_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: env_u64("PG_ACQUIRE_TIMEOUT_SECS", 5),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.pg_url.is_some()
    }
}

// ── Adaptive batching ─────────────────────────────────────────

/// Batch sizing knobs for the processor's feedback loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub initial_size: usize,
    pub min_size: usize,
    pub max_size: usize,
    /// Success rate above this (on a fast batch) grows the batch.
    pub success_threshold: f64,
    /// Success rate below this shrinks the batch.
    pub failure_threshold: f64,
    pub growth_factor: f64,
    pub shrink_factor: f64,
    /// Batches faster than this count as fast (growth condition).
    pub fast_batch_ms: u64,
    /// Batches slower than this force a shrink.
    pub slow_batch_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_size: 100,
            min_size: 10,
            max_size: 500,
            success_threshold: 0.95,
            failure_threshold: 0.5,
            growth_factor: 1.5,
            shrink_factor: 0.75,
            fast_batch_ms: 1_000,
            slow_batch_ms: 5_000,
        }
    }
}

impl BatchConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            initial_size: env_usize("BATCH_INITIAL_SIZE", d.initial_size),
            min_size: env_usize("BATCH_MIN_SIZE", d.min_size),
            max_size: env_usize("BATCH_MAX_SIZE", d.max_size),
            success_threshold: env_f64("BATCH_SUCCESS_THRESHOLD", d.success_threshold),
            failure_threshold: env_f64("BATCH_FAILURE_THRESHOLD", d.failure_threshold),
            growth_factor: env_f64("BATCH_GROWTH_FACTOR", d.growth_factor),
            shrink_factor: env_f64("BATCH_SHRINK_FACTOR", d.shrink_factor),
            fast_batch_ms: env_u64("BATCH_FAST_MS", d.fast_batch_ms),
            slow_batch_ms: env_u64("BATCH_SLOW_MS", d.slow_batch_ms),
        }
    }

    /// Reject configs that cannot drive the sizing loop.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_size == 0 {
            return Err("min_size must be at least 1".into());
        }
        if self.min_size > self.max_size {
            return Err(format!(
                "min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            ));
        }
        if !(self.min_size..=self.max_size).contains(&self.initial_size) {
            return Err(format!(
                "initial_size {} outside [{}, {}]",
                self.initial_size, self.min_size, self.max_size
            ));
        }
        if self.success_threshold <= self.failure_threshold {
            return Err("success_threshold must exceed failure_threshold".into());
        }
        if self.growth_factor <= 1.0 {
            return Err("growth_factor must be greater than 1".into());
        }
        if self.shrink_factor <= 0.0 || self.shrink_factor >= 1.0 {
            return Err("shrink_factor must be between 0 and 1".into());
        }
        Ok(())
    }
}
