//! Prompt construction for the classification oracle.

use spedition_core::{EntityKind, FileMeta, Record};

/// Sample rows beyond this are not sent to the oracle.
pub const SAMPLE_LIMIT: usize = 10;

/// System prompt: answer shape, allowed tokens, identity fields per entity.
pub fn system_prompt() -> String {
    let mut identity = String::new();
    for entity in EntityKind::ALL {
        identity.push_str("- ");
        identity.push_str(entity.as_str());
        identity.push_str(": ");
        identity.push_str(&entity.required_identity_fields().join(", "));
        identity.push('\n');
    }

    format!(
        r#"You are a schema analyst for a field service data importer.
Uploads are exports from field service platforms (ServiceTitan, Housecall Pro, Jobber, Workiz, FieldEdge, QuickBooks) or hand-rolled spreadsheets.

Given column headers, sample rows and file metadata, respond with ONE JSON object:
{{
  "platform": "service_titan" | "housecall_pro" | "jobber" | "workiz" | "field_edge" | "quickbooks" | "generic",
  "entity": "customers" | "jobs" | "invoices" | "estimates" | "equipment" | "price_book",
  "confidence": 0.0-1.0,
  "reasoning": "one or two sentences",
  "mappings": [
    {{
      "source_field": "exact header text",
      "target_field": "snake_case field name",
      "transform": "direct" | "split" | "join" | "convert" | "lookup" | "custom",
      "params": {{"separator": " ", "index": "0"}},
      "confidence": 0.0-1.0,
      "required": true
    }}
  ],
  "quality_issues": [
    {{
      "kind": "missing_required" | "invalid_format" | "duplicate" | "outlier" | "inconsistent",
      "field": "header or target field name",
      "count": 0,
      "severity": "low" | "medium" | "high" | "critical",
      "suggestion": "what the user should fix"
    }}
  ]
}}

Transform params: "split" needs "separator" and "index"; "convert" needs "format" (iso_date, integer, float, boolean or phone); "lookup" params are the value table itself; "custom" needs "name" (trim, uppercase, lowercase or digits_only).
Map every header you can; never invent headers that are not in the list.
Mark a mapping required only when its target is an identity field of the entity:
{identity}"#
    )
}

/// User prompt: file metadata, the header list and sample rows as JSON lines.
pub fn build_user_prompt(headers: &[String], sample: &[Record], meta: &FileMeta) -> String {
    let mut prompt = format!(
        "File: {} ({} bytes, {} rows)\nHeaders: {}\n\nSample rows:\n",
        meta.file_name,
        meta.file_size,
        meta.row_count,
        headers.join(", ")
    );
    for record in sample.iter().take(SAMPLE_LIMIT) {
        let line = serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string());
        prompt.push_str(&line);
        prompt.push('\n');
    }
    prompt.push_str("\nRespond ONLY with valid JSON, no explanation.");
    prompt
}
