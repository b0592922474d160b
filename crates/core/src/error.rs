use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Stable machine-readable codes carried on per-record errors.
pub mod codes {
    pub const UNIQUE_VIOLATION: &str = "unique_violation";
    pub const CHECK_VIOLATION: &str = "check_violation";
    pub const NOT_NULL_VIOLATION: &str = "not_null_violation";
    pub const STORE_REJECTED: &str = "store_rejected";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Warning,
    Error,
}

/// One failed record, kept with enough context to retry by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportError {
    /// Position of the record in the original input (0-based).
    pub record_index: usize,
    /// The mapped payload that was rejected.
    pub payload: Record,
    pub message: String,
    pub code: String,
    pub severity: ErrorSeverity,
    pub retryable: bool,
}
