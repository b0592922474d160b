//! Schema detection: ask the oracle, fall back to deterministic heuristics.
//!
//! The oracle (an LLM) is optional and untrusted. Anything it gets wrong —
//! timeouts, API errors, malformed JSON, hallucinated columns — downgrades
//! the call to the heuristic path. The only hard error is unusable input.

use std::time::Duration;

use tracing::{debug, info, warn};

use spedition_core::config::ClassifierConfig;
use spedition_core::{Classification, FileMeta, Record};

use crate::heuristics;
use crate::prompt;
use crate::provider::{LlmError, LlmProvider, OraclePrompt};
use crate::providers::create_provider;

/// Input problems the caller must fix before retrying.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("cannot classify a file with no column headers")]
    EmptyHeaders,
}

#[derive(Debug, thiserror::Error)]
enum OracleError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid classification reply: {0}")]
    InvalidReply(String),
}

/// Detects platform, entity kind and field mappings for an uploaded file.
pub struct SchemaClassifier {
    oracle: Option<Box<dyn LlmProvider>>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl SchemaClassifier {
    pub fn new(
        oracle: Box<dyn LlmProvider>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle: Some(oracle),
            temperature,
            max_tokens,
            timeout,
        }
    }

    /// Heuristics only; no oracle call is ever made.
    pub fn heuristic_only() -> Self {
        Self {
            oracle: None,
            temperature: 0.0,
            max_tokens: 0,
            timeout: Duration::ZERO,
        }
    }

    /// Build from config. A missing or disabled provider downgrades to
    /// heuristics instead of failing.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        match create_provider(config) {
            Ok(provider) => {
                info!("classification oracle: {}", config.provider);
                Self::new(
                    provider,
                    config.temperature,
                    config.max_tokens,
                    Duration::from_secs(config.timeout_secs),
                )
            }
            Err(e) => {
                if config.provider != "off" {
                    warn!("classification oracle unavailable ({}), using heuristics", e);
                }
                Self::heuristic_only()
            }
        }
    }

    /// Classify an uploaded file from its column headers, a sample of its
    /// rows and file-level metadata.
    pub async fn classify(
        &self,
        headers: &[String],
        sample: &[Record],
        meta: &FileMeta,
    ) -> Result<Classification, ClassifyError> {
        if headers.is_empty() {
            return Err(ClassifyError::EmptyHeaders);
        }

        if let Some(oracle) = &self.oracle {
            match self.ask_oracle(oracle.as_ref(), headers, sample, meta).await {
                Ok(classification) => {
                    info!(
                        platform = %classification.platform,
                        entity = %classification.entity,
                        confidence = classification.confidence,
                        mappings = classification.mappings.len(),
                        "oracle classified file"
                    );
                    return Ok(classification);
                }
                Err(e) => warn!("classification oracle failed ({}), using heuristics", e),
            }
        }

        let classification = heuristics::classify(headers, sample);
        info!(
            platform = %classification.platform,
            entity = %classification.entity,
            confidence = classification.confidence,
            mappings = classification.mappings.len(),
            "heuristic classification"
        );
        Ok(classification)
    }

    async fn ask_oracle(
        &self,
        oracle: &dyn LlmProvider,
        headers: &[String],
        sample: &[Record],
        meta: &FileMeta,
    ) -> Result<Classification, OracleError> {
        let request = OraclePrompt {
            system: prompt::system_prompt(),
            user: prompt::build_user_prompt(headers, sample, meta),
        };

        let response = tokio::time::timeout(
            self.timeout,
            oracle.complete(&request, self.temperature, self.max_tokens),
        )
        .await
        .map_err(|_| OracleError::Timeout(self.timeout))??;

        debug!("oracle reply: {}", response);

        // Extract JSON from response (handle markdown code blocks)
        let json = extract_json(&response);
        let mut classification: Classification =
            serde_json::from_str(json).map_err(|e| OracleError::InvalidReply(e.to_string()))?;

        sanitize(&mut classification, headers)?;
        Ok(classification)
    }
}

/// Clamp confidences, drop hallucinated columns, recompute required flags.
fn sanitize(
    classification: &mut Classification,
    headers: &[String],
) -> Result<(), OracleError> {
    classification.confidence = classification.confidence.clamp(0.0, 1.0);

    let before = classification.mappings.len();
    classification
        .mappings
        .retain(|m| headers.iter().any(|h| h == &m.source_field));
    let dropped = before - classification.mappings.len();
    if dropped > 0 {
        warn!("oracle mapped {} unknown column(s), dropped", dropped);
    }

    let identity = classification.entity.required_identity_fields();
    for mapping in &mut classification.mappings {
        mapping.confidence = mapping.confidence.clamp(0.0, 1.0);
        mapping.required = identity.contains(&mapping.target_field.as_str());
    }

    // An oracle reply with nothing usable left is a bad reply, not a
    // legitimate "no mappings" verdict.
    if classification.mappings.is_empty() {
        return Err(OracleError::InvalidReply("no usable mappings".into()));
    }
    Ok(())
}

/// Extract JSON from an LLM response, handling markdown code blocks.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks
    if let Some(start) = trimmed.find("```") {
        let json_start = start + 3;
        // Skip past any language identifier on the same line
        let after_tick = &trimmed[json_start..];
        let content_start = after_tick.find('\n').map_or(0, |n| n + 1);
        if let Some(end) = after_tick[content_start..].find("```") {
            return after_tick[content_start..content_start + end].trim();
        }
    }

    // Try raw JSON (starts with {)
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            return &trimmed[start..=end];
        }
    }

    trimmed
}
