//! Schema classification for uploaded exports.
//!
//! This crate provides:
//! - An LLM oracle (OpenAI / Anthropic / Ollama) that reads headers and
//!   sample rows and proposes a [`spedition_core::Classification`]
//! - A deterministic heuristic fallback driven by platform column signatures
//! - Mapping validation that gates a run before anything is written

pub mod classifier;
pub mod heuristics;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod validate;

pub use classifier::{ClassifyError, SchemaClassifier};
pub use provider::{LlmError, LlmProvider, OraclePrompt};
pub use validate::{validate_mappings, MappingValidation, MIN_CONFIDENCE};
