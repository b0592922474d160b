use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant identifier — every imported row belongs to exactly one tenant.
pub type TenantId = Uuid;

/// A source or mapped row: flat field map in insertion order.
/// Serializes as a plain JSON object.
pub type Record = IndexMap<String, FieldValue>;

/// Typed field values — exports arrive mostly as strings but we preserve type info.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl FieldValue {
    /// Extract as string, returning None for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// True for Null and for text that is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render for prompts, search text and transform input. Null renders empty.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Null => String::new(),
        }
    }

    /// Convert an arbitrary JSON value; nested arrays/objects are stringified.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

/// Build a record from a raw JSON object.
pub fn record_from_json(obj: &serde_json::Map<String, serde_json::Value>) -> Record {
    obj.iter()
        .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_preserves_scalar_types() {
        assert_eq!(
            FieldValue::from_json(&serde_json::json!("INV-1")),
            FieldValue::Text("INV-1".to_string())
        );
        assert_eq!(FieldValue::from_json(&serde_json::json!(42)), FieldValue::Integer(42));
        assert_eq!(FieldValue::from_json(&serde_json::json!(1.5)), FieldValue::Float(1.5));
        assert_eq!(FieldValue::from_json(&serde_json::json!(true)), FieldValue::Boolean(true));
        assert_eq!(FieldValue::from_json(&serde_json::Value::Null), FieldValue::Null);
    }

    #[test]
    fn from_json_stringifies_nested_values() {
        let v = FieldValue::from_json(&serde_json::json!(["a", "b"]));
        assert_eq!(v, FieldValue::Text("[\"a\",\"b\"]".to_string()));
    }

    #[test]
    fn blank_covers_null_and_whitespace() {
        assert!(FieldValue::Null.is_blank());
        assert!(FieldValue::Text("   ".to_string()).is_blank());
        assert!(!FieldValue::Text("x".to_string()).is_blank());
        assert!(!FieldValue::Integer(0).is_blank());
    }

    #[test]
    fn record_serializes_as_plain_object() {
        let mut record = Record::new();
        record.insert("name".to_string(), FieldValue::Text("Acme".to_string()));
        record.insert("visits".to_string(), FieldValue::Integer(3));
        record.insert("vip".to_string(), FieldValue::Null);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Acme", "visits": 3, "vip": null}));

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
