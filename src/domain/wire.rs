//! Wire integer codec
//!
//! HIS exports 64-bit integers (ids, timestamps) through a driver that cannot
//! represent them natively, so they arrive either as plain JSON numbers, as
//! numeric strings, or as an object holding two 32-bit words:
//!
//! ```json
//! { "low": 1001, "high": 0 }
//! ```
//!
//! The word pair is detected structurally, never by a type tag. Everything in
//! this module runs once at ingress; the split form is never stored or
//! returned by the engine.

use crate::domain::{MedSyncError, Result};
use serde_json::{Map, Number, Value};

const WORD_KEYS: [(&str, &str); 2] = [("low", "high"), ("lowWord", "highWord")];

/// Classified form of an inbound integer field
///
/// # Examples
///
/// ```
/// use medsync::domain::wire::WireInteger;
/// use serde_json::json;
///
/// let value = json!({"low": 5, "high": 1});
/// let wire = WireInteger::classify(Some(&value));
/// assert_eq!(wire, WireInteger::SplitWords { low: 5, high: 1 });
/// assert_eq!(wire.value(), Some(5 + (1_i64 << 32)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireInteger {
    /// A JSON number or numeric string
    Native(i64),
    /// Two 32-bit words, `low + high * 2^32`
    SplitWords { low: u32, high: u32 },
    /// Null, absent or unparsable
    Missing,
}

impl WireInteger {
    /// Classify a raw JSON value
    pub fn classify(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => WireInteger::Missing,
            Some(Value::Number(n)) => number_to_i64(n)
                .map(WireInteger::Native)
                .unwrap_or(WireInteger::Missing),
            Some(Value::String(s)) => parse_numeric_str(s)
                .map(WireInteger::Native)
                .unwrap_or(WireInteger::Missing),
            Some(Value::Object(map)) => split_words(map)
                .map(|(low, high)| WireInteger::SplitWords { low, high })
                .unwrap_or(WireInteger::Missing),
            Some(_) => WireInteger::Missing,
        }
    }

    /// Native integer value
    ///
    /// Split words are read as a two's-complement 64-bit integer, so a high
    /// word at or above `2^31` yields a negative number, exactly as the
    /// sending side's signed 64-bit column held it.
    pub fn value(self) -> Option<i64> {
        match self {
            WireInteger::Native(v) => Some(v),
            WireInteger::SplitWords { low, high } => {
                Some((((high as u64) << 32) | low as u64) as i64)
            }
            WireInteger::Missing => None,
        }
    }

    /// Whether the value was absent or unparsable
    pub fn is_missing(self) -> bool {
        matches!(self, WireInteger::Missing)
    }
}

/// Decode an optional inbound value to a native integer
pub fn decode(value: Option<&Value>) -> Option<i64> {
    WireInteger::classify(value).value()
}

/// Decode a field that acts as a key
///
/// # Errors
///
/// Returns `FieldInvalid` when the value is null, absent or unparsable.
pub fn decode_required(value: Option<&Value>, field: &str) -> Result<i64> {
    decode(value).ok_or_else(|| {
        let reason = match value {
            None | Some(Value::Null) => "value is missing".to_string(),
            Some(other) => format!("cannot decode {other} as a 64-bit integer"),
        };
        MedSyncError::field_invalid(field, reason)
    })
}

/// Decode a decimal field (amounts)
pub fn decode_decimal(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        other => decode(other).map(|v| v as f64),
    }
}

/// Replace every split-word pair anywhere in `value` with its native integer
pub fn decode_deep(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if let Some((low, high)) = split_words(&map) {
                let decoded = WireInteger::SplitWords { low, high }.value().unwrap_or_default();
                return Value::Number(Number::from(decoded));
            }
            Value::Object(
                map.into_iter()
                    .map(|(key, inner)| (key, decode_deep(inner)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(decode_deep).collect()),
        other => other,
    }
}

fn number_to_i64(n: &Number) -> Option<i64> {
    if let Some(v) = n.as_i64() {
        return Some(v);
    }
    if let Some(v) = n.as_u64() {
        return i64::try_from(v).ok();
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_numeric_str(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    number_to_i64(&Number::from_f64(f)?)
}

fn split_words(map: &Map<String, Value>) -> Option<(u32, u32)> {
    for (low_key, high_key) in WORD_KEYS {
        let (Some(low), Some(high)) = (map.get(low_key), map.get(high_key)) else {
            continue;
        };

        // Only the word pair and the optional signedness flag may be present
        let extra_keys = map
            .iter()
            .filter(|(k, _)| k.as_str() != low_key && k.as_str() != high_key)
            .any(|(k, v)| k != "unsigned" || !v.is_boolean());
        if extra_keys {
            return None;
        }

        return Some((word(low)?, word(high)?));
    }
    None
}

fn word(value: &Value) -> Option<u32> {
    let v = value.as_i64()?;
    if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&v) {
        // Signed words keep their 32-bit pattern
        Some(v as u32)
    } else {
        None
    }
}
