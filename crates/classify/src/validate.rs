//! Pre-flight mapping validation.
//!
//! Gates a run between classification and processing: a classification that
//! fails here rejects the whole run before anything is written. Every rule
//! is evaluated — errors accumulate rather than short-circuit, so the user
//! sees all problems at once.

use serde::{Deserialize, Serialize};

use spedition_core::Classification;

/// Minimum classification confidence for an import to proceed.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Validation outcome. `valid` is false exactly when `errors` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl MappingValidation {
    fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }
}

/// Check a classification against the rules that gate processing.
pub fn validate_mappings(classification: &Classification) -> MappingValidation {
    let mut result = MappingValidation::new();

    if classification.confidence < MIN_CONFIDENCE {
        result.error(format!(
            "confidence too low: {:.2} is below the {} floor",
            classification.confidence, MIN_CONFIDENCE
        ));
    }

    if classification.mappings.is_empty() {
        result.error("no mappings suggested");
    }

    let identity = classification.entity.required_identity_fields();
    let has_identity_target = classification
        .mappings
        .iter()
        .any(|m| identity.contains(&m.target_field.as_str()));
    if !has_identity_target {
        result.error(format!(
            "no required fields detected: map at least one of {} for {}",
            identity.join(", "),
            classification.entity
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use spedition_core::{EntityKind, FieldMapping, SourcePlatform};

    use super::*;

    fn classification(confidence: f64, mappings: Vec<FieldMapping>) -> Classification {
        Classification {
            platform: SourcePlatform::Generic,
            entity: EntityKind::Customers,
            confidence,
            reasoning: "test".to_string(),
            mappings,
            quality_issues: Vec::new(),
        }
    }

    #[test]
    fn good_classification_passes() {
        let c = classification(0.9, vec![FieldMapping::direct("Email", "email", 0.9, true)]);
        let got = validate_mappings(&c);
        assert!(got.valid);
        assert!(got.errors.is_empty());
    }

    #[test]
    fn confidence_at_the_floor_passes() {
        let c = classification(0.5, vec![FieldMapping::direct("Email", "email", 0.5, true)]);
        assert!(validate_mappings(&c).valid);
    }

    #[test]
    fn low_confidence_is_rejected() {
        let c = classification(0.3, vec![FieldMapping::direct("Email", "email", 0.9, true)]);
        let got = validate_mappings(&c);
        assert!(!got.valid);
        assert_eq!(got.errors.len(), 1);
        assert!(got.errors[0].contains("confidence too low"));
    }

    #[test]
    fn no_identity_target_is_rejected() {
        let c = classification(0.9, vec![FieldMapping::direct("Notes", "notes", 0.9, false)]);
        let got = validate_mappings(&c);
        assert!(!got.valid);
        assert_eq!(got.errors.len(), 1);
        assert!(got.errors[0].contains("no required fields detected"));
    }

    #[test]
    fn empty_mappings_accumulates_both_errors() {
        let c = classification(0.9, Vec::new());
        let got = validate_mappings(&c);
        assert!(!got.valid);
        assert_eq!(got.errors.len(), 2);
        assert!(got.errors[0].contains("no mappings suggested"));
        assert!(got.errors[1].contains("no required fields detected"));
    }

    #[test]
    fn all_three_rules_report_together() {
        let c = classification(0.1, Vec::new());
        let got = validate_mappings(&c);
        assert_eq!(got.errors.len(), 3);
        assert!(got.errors[0].contains("confidence too low"));
    }
}
