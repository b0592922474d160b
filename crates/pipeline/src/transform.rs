//! Row transforms: map one raw source row onto target fields.
//!
//! Transforms are total. A value that cannot be split, converted or looked
//! up lands unchanged (or as Null where the contract says so) and moves on;
//! the datastore's constraints are the arbiter of validity. Nothing here
//! returns an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use spedition_core::{FieldMapping, FieldValue, Record, TransformKind};

type Params = BTreeMap<String, String>;

/// Apply a mapping plan to one raw row.
///
/// Target fields land in mapping order. Join mappings that share a target
/// field concatenate into it; every other transform overwrites.
pub fn apply_mappings(raw: &Record, mappings: &[FieldMapping]) -> Record {
    let mut out = Record::new();

    for mapping in mappings {
        let source = raw
            .get(&mapping.source_field)
            .cloned()
            .unwrap_or(FieldValue::Null);

        match mapping.transform {
            TransformKind::Direct => {
                out.insert(mapping.target_field.clone(), source);
            }
            TransformKind::Split => {
                out.insert(
                    mapping.target_field.clone(),
                    split_value(&source, &mapping.params),
                );
            }
            TransformKind::Join => {
                join_into(&mut out, &mapping.target_field, &source, &mapping.params);
            }
            TransformKind::Convert => {
                out.insert(
                    mapping.target_field.clone(),
                    convert_value(source, &mapping.params),
                );
            }
            TransformKind::Lookup => {
                out.insert(
                    mapping.target_field.clone(),
                    lookup_value(source, &mapping.params),
                );
            }
            TransformKind::Custom => {
                out.insert(
                    mapping.target_field.clone(),
                    custom_value(source, &mapping.params),
                );
            }
        }
    }

    out
}

// ── Split ───────────────────────────────────────────────────────────

/// Token `index` of the source value, split on `separator` (whitespace when
/// unset). A missing token is Null, not an error.
fn split_value(source: &FieldValue, params: &Params) -> FieldValue {
    let text = source.render();
    let index: usize = params
        .get("index")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let token = match params.get("separator").map(String::as_str) {
        Some(sep) if !sep.is_empty() => text.split(sep).nth(index).map(str::trim),
        _ => text.split_whitespace().nth(index),
    };

    match token {
        Some(t) if !t.is_empty() => FieldValue::Text(t.to_string()),
        _ => FieldValue::Null,
    }
}

// ── Join ────────────────────────────────────────────────────────────

/// Append the source value to whatever earlier Join mappings already put
/// into `target`. Blank pieces are skipped so "Ada" + nothing stays "Ada".
fn join_into(out: &mut Record, target: &str, source: &FieldValue, params: &Params) {
    if !out.contains_key(target) {
        out.insert(target.to_string(), FieldValue::Null);
    }
    if source.is_blank() {
        return;
    }

    let separator = params.get("separator").map(String::as_str).unwrap_or(" ");
    let piece = source.render();
    let merged = match out.get(target) {
        Some(FieldValue::Text(prev)) if !prev.is_empty() => format!("{prev}{separator}{piece}"),
        _ => piece,
    };
    out.insert(target.to_string(), FieldValue::Text(merged));
}

// ── Convert ─────────────────────────────────────────────────────────

/// Coerce the value into the `format` named in the params. Values that do
/// not parse keep their original form.
fn convert_value(source: FieldValue, params: &Params) -> FieldValue {
    match params.get("format").map(String::as_str) {
        Some("integer") => convert_integer(source),
        Some("float") => convert_float(source),
        Some("boolean") => convert_boolean(source),
        Some("iso_date") => convert_iso_date(source),
        Some("phone") => convert_phone(source),
        _ => source,
    }
}

fn convert_integer(source: FieldValue) -> FieldValue {
    match &source {
        FieldValue::Integer(_) => source,
        FieldValue::Float(f) => FieldValue::Integer(*f as i64),
        FieldValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => FieldValue::Integer(i),
            Err(_) => source,
        },
        _ => source,
    }
}

fn convert_float(source: FieldValue) -> FieldValue {
    match &source {
        FieldValue::Float(_) => source,
        FieldValue::Integer(i) => FieldValue::Float(*i as f64),
        FieldValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) => FieldValue::Float(f),
            Err(_) => source,
        },
        _ => source,
    }
}

fn convert_boolean(source: FieldValue) -> FieldValue {
    match &source {
        FieldValue::Boolean(_) => source,
        FieldValue::Integer(0) => FieldValue::Boolean(false),
        FieldValue::Integer(1) => FieldValue::Boolean(true),
        FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => FieldValue::Boolean(true),
            "false" | "no" | "n" | "0" => FieldValue::Boolean(false),
            _ => source,
        },
        _ => source,
    }
}

/// Normalize dates to `YYYY-MM-DD`. Accepts ISO, US slash and RFC 3339
/// timestamp forms; anything else keeps the original value.
fn convert_iso_date(source: FieldValue) -> FieldValue {
    let FieldValue::Text(raw) = &source else {
        return source;
    };
    let text = raw.trim();

    let parsed = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(text, "%m-%d-%Y"))
        .or_else(|_| {
            chrono::DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive())
        });

    match parsed {
        Ok(date) => FieldValue::Text(date.format("%Y-%m-%d").to_string()),
        Err(_) => source,
    }
}

/// Strip phone formatting down to digits, keeping a leading `+`. Values
/// with fewer than 7 digits are left alone.
fn convert_phone(source: FieldValue) -> FieldValue {
    let FieldValue::Text(raw) = &source else {
        return source;
    };

    let mut normalized = String::with_capacity(raw.len());
    for (i, c) in raw.trim().chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            normalized.push(c);
        }
    }

    let digits = normalized.chars().filter(char::is_ascii_digit).count();
    if digits >= 7 {
        FieldValue::Text(normalized)
    } else {
        source
    }
}

// ── Lookup ──────────────────────────────────────────────────────────

/// The params map IS the lookup table. Keys the table does not know keep
/// their original value.
fn lookup_value(source: FieldValue, table: &Params) -> FieldValue {
    let key = source.render();
    match table.get(key.trim()) {
        Some(replacement) => FieldValue::Text(replacement.clone()),
        None => source,
    }
}

// ── Custom ──────────────────────────────────────────────────────────

/// Fixed table of named text functions. Unknown names and non-text values
/// pass through untouched.
fn custom_value(source: FieldValue, params: &Params) -> FieldValue {
    let FieldValue::Text(text) = &source else {
        return source;
    };

    match params.get("name").map(String::as_str) {
        Some("trim") => FieldValue::Text(text.trim().to_string()),
        Some("uppercase") => FieldValue::Text(text.to_uppercase()),
        Some("lowercase") => FieldValue::Text(text.to_lowercase()),
        Some("digits_only") => {
            FieldValue::Text(text.chars().filter(char::is_ascii_digit).collect())
        }
        _ => source,
    }
}
