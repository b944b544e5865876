//! Transfer Events
//!
//! Lenient model of the token-transfer objects returned by the explorer's
//! `tokentx` action. Field values are accepted as JSON strings or numbers.

use serde_json::{Map, Value};

/// Rendered in place of any missing display field
pub const MISSING_FIELD: &str = "N/A";

/// One token transfer as reported by the explorer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEvent {
    /// Transaction hash, if the explorer supplied one
    pub hash: Option<String>,
    /// Token display name (`tokenName`)
    pub token_name: Option<String>,
    /// Raw integer amount as a decimal string (`value`)
    pub raw_value: Option<String>,
    /// Token decimals (`tokenDecimal`)
    pub token_decimals: Option<String>,
    /// Sender address
    pub from: Option<String>,
    /// Recipient address
    pub to: Option<String>,
    /// Canonical JSON of the full object, used when `hash` is absent
    content_key: String,
}

impl TransferEvent {
    /// Build an event from one element of the explorer's `result` list
    ///
    /// # Returns
    /// `None` if the element is not a JSON object
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        Some(TransferEvent {
            hash: string_field(object, "hash"),
            token_name: string_field(object, "tokenName"),
            raw_value: string_field(object, "value"),
            token_decimals: decimals_field(object),
            from: string_field(object, "from"),
            to: string_field(object, "to"),
            // serde_json maps are key-ordered, so this is deterministic
            content_key: value.to_string(),
        })
    }

    /// Parse every object in a `result` list, skipping non-object entries
    pub fn from_json_list(items: &[Value]) -> Vec<Self> {
        items.iter().filter_map(Self::from_json).collect()
    }

    /// Deterministic string derived from the event's full contents
    pub fn content_key(&self) -> &str {
        &self.content_key
    }

    pub fn token_name_or_missing(&self) -> &str {
        self.token_name.as_deref().unwrap_or(MISSING_FIELD)
    }

    pub fn raw_value_or_missing(&self) -> &str {
        self.raw_value.as_deref().unwrap_or(MISSING_FIELD)
    }

    pub fn from_or_missing(&self) -> &str {
        self.from.as_deref().unwrap_or(MISSING_FIELD)
    }

    pub fn to_or_missing(&self) -> &str {
        self.to.as_deref().unwrap_or(MISSING_FIELD)
    }
}

/// `tokenDecimal`, treating falsy JSON (`0`, `false`, `""`, empty containers)
/// as absent so the raw value is shown unscaled
fn decimals_field(object: &Map<String, Value>) -> Option<String> {
    match object.get("tokenDecimal")? {
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        _ => string_field(object, "tokenDecimal"),
    }
}

/// Read a field as a string, accepting numbers; `null` counts as absent
fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
