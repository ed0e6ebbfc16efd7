//! Inbound HIS payloads
//!
//! HIS delivers each record as a flat map of upper-case field names to scalar
//! or split-word values. Keys are normalised to upper case on construction so
//! lookups are case-insensitive; unknown keys are carried but ignored by the
//! field maps.

use crate::domain::wire;
use crate::domain::{MedSyncError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single HIS record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct HisPayload {
    fields: Map<String, Value>,
}

impl HisPayload {
    /// Build a payload from a JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.to_uppercase(), value))
                .collect(),
        }
    }

    /// Build a payload from an arbitrary JSON value
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value is not an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            other => Err(MedSyncError::Validation(format!(
                "HIS payload must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Raw value of a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(&key.to_uppercase())
    }

    /// Whether the field is present (a present `null` counts)
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(&key.to_uppercase())
    }

    /// Overwrite a field
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_uppercase(), value);
    }

    /// Decoded integer field
    pub fn integer(&self, key: &str) -> Option<i64> {
        wire::decode(self.get(key))
    }

    /// Decoded integer field that must be present
    ///
    /// # Errors
    ///
    /// Returns `FieldInvalid` when the field is missing or unparsable
    pub fn required_integer(&self, key: &str) -> Result<i64> {
        wire::decode_required(self.get(key), key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the payload has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for HisPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self::new(map)
    }
}

impl From<HisPayload> for Map<String, Value> {
    fn from(payload: HisPayload) -> Self {
        payload.fields
    }
}

/// Three-way field update read from a payload
///
/// Absent fields leave the stored value untouched; a present `null` clears it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    /// Field not in the payload
    Absent,
    /// Field present with `null` (or an unparsable value)
    Clear,
    /// Field present with a value
    Set(T),
}

impl<T> FieldUpdate<T> {
    /// Read a field, converting present values with `convert`
    pub fn read(payload: &HisPayload, key: &str, convert: impl FnOnce(&Value) -> Option<T>) -> Self {
        match payload.get(key) {
            None => FieldUpdate::Absent,
            Some(Value::Null) => FieldUpdate::Clear,
            Some(value) => match convert(value) {
                Some(v) => FieldUpdate::Set(v),
                None => FieldUpdate::Clear,
            },
        }
    }

    /// Apply to a stored optional value
    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            FieldUpdate::Absent => {}
            FieldUpdate::Clear => *target = None,
            FieldUpdate::Set(v) => *target = Some(v),
        }
    }

    /// Whether the field was present in the payload
    pub fn is_present(&self) -> bool {
        !matches!(self, FieldUpdate::Absent)
    }
}

/// Read a string field, accepting numbers and trimming whitespace
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(_) => wire::decode(Some(value)).map(|v| v.to_string()),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
