//! Deterministic fallback classification.
//!
//! No model, no network: platform detection works off column signatures,
//! entity detection off header keywords, and every header gets a default
//! mapping to its slugified name. Identical inputs yield identical output.

use std::collections::HashSet;

use spedition_core::{
    Classification, EntityKind, FieldMapping, IssueSeverity, QualityIssue, QualityIssueKind,
    Record, SourcePlatform,
};

/// Confidence when a platform column signature matches.
pub const SIGNATURE_CONFIDENCE: f64 = 0.8;
/// Confidence for the generic path and for default per-header mappings.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Column fingerprint of a known platform export. Matches when every listed
/// slug is present in the file's slugified headers.
struct PlatformSignature {
    platform: SourcePlatform,
    entity: EntityKind,
    columns: &'static [&'static str],
}

const SIGNATURES: &[PlatformSignature] = &[
    // ServiceTitan exports carry the tenant id on every row
    PlatformSignature {
        platform: SourcePlatform::ServiceTitan,
        entity: EntityKind::Jobs,
        columns: &["tenant_id", "job_number", "modified_on"],
    },
    PlatformSignature {
        platform: SourcePlatform::ServiceTitan,
        entity: EntityKind::Customers,
        columns: &["tenant_id", "customer_id", "modified_on"],
    },
    PlatformSignature {
        platform: SourcePlatform::ServiceTitan,
        entity: EntityKind::Invoices,
        columns: &["tenant_id", "invoice_number", "modified_on"],
    },
    PlatformSignature {
        platform: SourcePlatform::HousecallPro,
        entity: EntityKind::Customers,
        columns: &["first_name", "last_name", "mobile_phone"],
    },
    PlatformSignature {
        platform: SourcePlatform::HousecallPro,
        entity: EntityKind::Jobs,
        columns: &["job", "customer", "scheduled_start"],
    },
    PlatformSignature {
        platform: SourcePlatform::Jobber,
        entity: EntityKind::Customers,
        columns: &["client_first_name", "client_last_name"],
    },
    PlatformSignature {
        platform: SourcePlatform::Jobber,
        entity: EntityKind::Jobs,
        columns: &["client_name", "property_address"],
    },
    PlatformSignature {
        platform: SourcePlatform::Workiz,
        entity: EntityKind::Jobs,
        columns: &["job_id", "client_name", "job_type"],
    },
    PlatformSignature {
        platform: SourcePlatform::FieldEdge,
        entity: EntityKind::Customers,
        columns: &["customer_number", "bill_to_name"],
    },
    PlatformSignature {
        platform: SourcePlatform::QuickBooks,
        entity: EntityKind::Invoices,
        columns: &["invoice_no", "customer", "open_balance"],
    },
];

/// Header keywords per entity, checked in order; first entity with a hit
/// wins. Invoice-ish columns outrank customer-ish ones because invoice
/// exports routinely carry customer columns too.
const ENTITY_HINTS: &[(EntityKind, &[&str])] = &[
    (
        EntityKind::Invoices,
        &["invoice_number", "invoice_no", "invoice", "amount_due", "balance_due"],
    ),
    (
        EntityKind::Estimates,
        &["estimate_number", "estimate", "quote_number", "quote"],
    ),
    (
        EntityKind::Equipment,
        &["serial_number", "serial", "model_number", "asset_tag", "install_date"],
    ),
    (
        EntityKind::PriceBook,
        &["sku", "unit_price", "unit_cost", "price_book", "item_code", "list_price"],
    ),
    (
        EntityKind::Jobs,
        &["job_number", "job", "work_order", "job_type", "technician", "scheduled_start"],
    ),
    (
        EntityKind::Customers,
        &["email", "phone", "first_name", "last_name", "customer", "company", "address"],
    ),
];

/// Classify from headers and sample rows alone.
pub fn classify(headers: &[String], sample: &[Record]) -> Classification {
    let slugs: Vec<String> = headers.iter().map(|h| slugify(h)).collect();

    let (platform, entity, confidence, reasoning) = match match_signature(&slugs) {
        Some(sig) => (
            sig.platform,
            sig.entity,
            SIGNATURE_CONFIDENCE,
            format!(
                "column signature matches a {} {} export",
                sig.platform, sig.entity
            ),
        ),
        None => {
            let entity = detect_entity(&slugs);
            (
                SourcePlatform::Generic,
                entity,
                DEFAULT_CONFIDENCE,
                format!(
                    "no platform signature matched; header keywords suggest {}",
                    entity
                ),
            )
        }
    };

    let mappings = default_mappings(headers, &slugs, entity);
    let quality_issues = scan_quality(&mappings, sample);

    Classification {
        platform,
        entity,
        confidence,
        reasoning,
        mappings,
        quality_issues,
    }
}

fn match_signature(slugs: &[String]) -> Option<&'static PlatformSignature> {
    SIGNATURES.iter().find(|sig| {
        sig.columns
            .iter()
            .all(|col| slugs.iter().any(|s| s == col))
    })
}

fn detect_entity(slugs: &[String]) -> EntityKind {
    for (entity, hints) in ENTITY_HINTS {
        if slugs
            .iter()
            .any(|slug| hints.iter().any(|hint| slug.contains(hint)))
        {
            return *entity;
        }
    }
    EntityKind::Customers
}

/// Normalize a header to snake_case: "Job Number" and "jobNumber" both
/// become "job_number", "Job #" becomes "job".
pub fn slugify(header: &str) -> String {
    let mut out = String::with_capacity(header.len() + 4);
    let mut prev_lower = false;
    for c in header.trim().chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// One Direct mapping per header onto its slug. Headers that slug to the
/// same name keep only the first occurrence.
fn default_mappings(headers: &[String], slugs: &[String], entity: EntityKind) -> Vec<FieldMapping> {
    let identity = entity.required_identity_fields();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut mappings = Vec::with_capacity(headers.len());

    for (header, slug) in headers.iter().zip(slugs) {
        if slug.is_empty() || !seen.insert(slug.as_str()) {
            continue;
        }
        mappings.push(FieldMapping::direct(
            header,
            slug,
            DEFAULT_CONFIDENCE,
            identity.contains(&slug.as_str()),
        ));
    }
    mappings
}

/// Look for obvious data problems in the sampled rows: empty identity
/// fields, malformed emails, duplicated identity values.
fn scan_quality(mappings: &[FieldMapping], sample: &[Record]) -> Vec<QualityIssue> {
    let mut issues = Vec::new();
    if sample.is_empty() {
        return issues;
    }

    for mapping in mappings.iter().filter(|m| m.required) {
        let blank = sample
            .iter()
            .filter(|r| r.get(&mapping.source_field).map_or(true, |v| v.is_blank()))
            .count();
        if blank > 0 {
            let severity = if blank == sample.len() {
                IssueSeverity::Critical
            } else {
                IssueSeverity::High
            };
            issues.push(QualityIssue {
                kind: QualityIssueKind::MissingRequired,
                field: mapping.target_field.clone(),
                count: blank as u64,
                severity,
                suggestion: format!(
                    "{} of {} sampled rows have no {}",
                    blank,
                    sample.len(),
                    mapping.target_field
                ),
            });
        }
    }

    for mapping in mappings.iter().filter(|m| m.target_field.contains("email")) {
        let bad = sample
            .iter()
            .filter_map(|r| r.get(&mapping.source_field))
            .filter(|v| !v.is_blank() && !is_valid_email(&v.render()))
            .count();
        if bad > 0 {
            issues.push(QualityIssue {
                kind: QualityIssueKind::InvalidFormat,
                field: mapping.target_field.clone(),
                count: bad as u64,
                severity: IssueSeverity::Medium,
                suggestion: format!(
                    "{} sampled {} value(s) are not valid email addresses",
                    bad, mapping.target_field
                ),
            });
        }
    }

    for mapping in mappings.iter().filter(|m| m.required) {
        let mut seen = HashSet::new();
        let mut dups = 0u64;
        for record in sample {
            if let Some(v) = record.get(&mapping.source_field) {
                if v.is_blank() {
                    continue;
                }
                if !seen.insert(v.render()) {
                    dups += 1;
                }
            }
        }
        if dups > 0 {
            issues.push(QualityIssue {
                kind: QualityIssueKind::Duplicate,
                field: mapping.target_field.clone(),
                count: dups,
                severity: IssueSeverity::Medium,
                suggestion: format!(
                    "{} duplicated {} value(s) in the sample may hit uniqueness constraints",
                    dups, mapping.target_field
                ),
            });
        }
    }

    issues
}

/// Email shape check: local@domain.tld with a letters-only TLD of 2+ chars.
fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || domain.contains('@')
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-".contains(c))
    {
        return false;
    }
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use spedition_core::FieldValue;

    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Text(v.to_string())))
            .collect()
    }

    #[test]
    fn slugify_handles_camel_case_and_spaces() {
        assert_eq!(slugify("jobNumber"), "job_number");
        assert_eq!(slugify("Job Number"), "job_number");
        assert_eq!(slugify("modifiedOn"), "modified_on");
        assert_eq!(slugify("Job #"), "job");
        assert_eq!(slugify("Bill-To Name"), "bill_to_name");
        assert_eq!(slugify("  Email  "), "email");
    }

    #[test]
    fn service_titan_jobs_signature_matches() {
        let got = classify(&headers(&["jobNumber", "tenantId", "modifiedOn"]), &[]);

        assert_eq!(got.platform, SourcePlatform::ServiceTitan);
        assert_eq!(got.entity, EntityKind::Jobs);
        assert!((got.confidence - SIGNATURE_CONFIDENCE).abs() < 1e-9);
        assert_eq!(got.mappings.len(), 3);

        let job = got
            .mappings
            .iter()
            .find(|m| m.target_field == "job_number")
            .unwrap();
        assert!(job.required);
        assert_eq!(job.source_field, "jobNumber");
        assert!((job.confidence - DEFAULT_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn unknown_layout_falls_back_to_generic() {
        let got = classify(&headers(&["Invoice No", "Customer", "Amount"]), &[]);

        assert_eq!(got.platform, SourcePlatform::Generic);
        assert_eq!(got.entity, EntityKind::Invoices);
        assert!((got.confidence - DEFAULT_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn plain_contact_columns_detect_customers() {
        let got = classify(&headers(&["Email", "Phone", "Notes"]), &[]);
        assert_eq!(got.entity, EntityKind::Customers);
        assert!(got.mappings.iter().any(|m| m.target_field == "email" && m.required));
    }

    #[test]
    fn colliding_headers_keep_first_mapping() {
        let got = classify(&headers(&["Phone", "phone"]), &[]);
        assert_eq!(got.mappings.len(), 1);
        assert_eq!(got.mappings[0].source_field, "Phone");
    }

    #[test]
    fn identical_inputs_identical_output() {
        let hs = headers(&["jobNumber", "tenantId", "modifiedOn"]);
        let sample = vec![row(&[("jobNumber", "J-1"), ("tenantId", "t1")])];
        assert_eq!(classify(&hs, &sample), classify(&hs, &sample));
    }

    #[test]
    fn quality_scan_flags_missing_invalid_and_duplicate() {
        let hs = headers(&["Email"]);
        let sample = vec![
            row(&[("Email", "a@example.com")]),
            row(&[("Email", "not-an-email")]),
            row(&[("Email", "")]),
            row(&[("Email", "a@example.com")]),
        ];
        let got = classify(&hs, &sample);

        let missing = got
            .quality_issues
            .iter()
            .find(|i| i.kind == QualityIssueKind::MissingRequired)
            .unwrap();
        assert_eq!(missing.count, 1);
        assert_eq!(missing.severity, IssueSeverity::High);

        let invalid = got
            .quality_issues
            .iter()
            .find(|i| i.kind == QualityIssueKind::InvalidFormat)
            .unwrap();
        assert_eq!(invalid.count, 1);

        let dup = got
            .quality_issues
            .iter()
            .find(|i| i.kind == QualityIssueKind::Duplicate)
            .unwrap();
        assert_eq!(dup.count, 1);
    }

    #[test]
    fn all_rows_missing_escalates_to_critical() {
        let hs = headers(&["Email", "Name"]);
        let sample = vec![row(&[("Name", "A")]), row(&[("Name", "B")])];
        let got = classify(&hs, &sample);

        let missing = got
            .quality_issues
            .iter()
            .find(|i| i.kind == QualityIssueKind::MissingRequired && i.field == "email")
            .unwrap();
        assert_eq!(missing.severity, IssueSeverity::Critical);
        assert_eq!(missing.count, 2);
    }

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("john.doe+tag@mail.example.com"));
        assert!(is_valid_email("A_B%c@ex-ample.org"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("x@nodot"));
        assert!(!is_valid_email("x@example.c"));
        assert!(!is_valid_email("x@example.c0m"));
        assert!(!is_valid_email("spa ce@example.com"));
    }
}
