use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityKind, SourcePlatform};

/// How a source column lands in a target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Direct,
    Split,
    Join,
    Convert,
    Lookup,
    Custom,
}

/// One source column → target field edge of a mapping plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    pub transform: TransformKind,
    /// Transform arguments: separator/index for split, format for convert,
    /// the table itself for lookup, function name for custom.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    pub confidence: f64,
    #[serde(default)]
    pub required: bool,
}

impl FieldMapping {
    /// Plain column copy at the given confidence.
    pub fn direct(source: &str, target: &str, confidence: f64, required: bool) -> Self {
        Self {
            source_field: source.to_string(),
            target_field: target.to_string(),
            transform: TransformKind::Direct,
            params: BTreeMap::new(),
            confidence,
            required,
        }
    }
}

/// What the classifier concluded about one uploaded file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub platform: SourcePlatform,
    pub entity: EntityKind,
    /// 0.0–1.0; below the validator's floor the run is rejected.
    pub confidence: f64,
    pub reasoning: String,
    pub mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub quality_issues: Vec<QualityIssue>,
}

/// Data quality observation from the sampled rows. Informational only:
/// issues are reported, never enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub kind: QualityIssueKind,
    pub field: String,
    pub count: u64,
    pub severity: IssueSeverity,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssueKind {
    MissingRequired,
    InvalidFormat,
    Duplicate,
    Outlier,
    Inconsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Upload-level facts fed to the classifier alongside headers and sample rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub file_name: String,
    pub file_size: u64,
    pub row_count: usize,
}
