//! Key codec: canonical, order-preserving key serialization
//!
//! Every key is reduced to a `SerializedKey` string whose plain byte-wise
//! ordering matches the natural ordering of the unserialized values:
//!
//! - numbers: `'A'` + 16 hex digits of an order-preserving transform of the
//!   IEEE-754 bits (negatives < zero < positives)
//! - strings: `'C'` + the string itself
//! - compound keys: serialized components joined by [`COMPOUND_SEPARATOR`]
//!
//! Numbers therefore always sort before strings. `null`, booleans, objects,
//! NaN and infinities are not valid key components, nor are integers beyond
//! the exactly representable `±2^53`. String components of a compound key
//! must not contain `\u{0}` or `\u{1}`.
//!
//! All functions here are pure.

use crate::error::{Error, Result};
use crate::types::{KeyPath, KeyValue, Row, SerializedKey};
use serde_json::Value;

/// Joins the serialized components of a compound key
pub const COMPOUND_SEPARATOR: &str = "\u{1}";

const NUMBER_TAG: char = 'A';
const STRING_TAG: char = 'C';

/// Largest integer magnitude an `f64` holds exactly
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Serialize one scalar key component
///
/// # Errors
///
/// Returns `Error::KeySerialization` for unsupported types, for NaN or
/// infinite numbers, and for integers whose magnitude exceeds `2^53`.
///
/// # Example
///
/// ```
/// use tidepool_core::codec::serialize_value_to_orderable_string;
/// use serde_json::json;
///
/// let a = serialize_value_to_orderable_string(&json!(-5)).unwrap();
/// let b = serialize_value_to_orderable_string(&json!(2.5)).unwrap();
/// let c = serialize_value_to_orderable_string(&json!("apple")).unwrap();
/// assert!(a < b && b < c);
/// assert_eq!(c, "Capple");
/// ```
pub fn serialize_value_to_orderable_string(value: &Value) -> Result<SerializedKey> {
    match value {
        Value::Number(number) => {
            let magnitude = number
                .as_u64()
                .or_else(|| number.as_i64().map(i64::unsigned_abs));
            if magnitude.is_some_and(|m| m > MAX_EXACT_INTEGER) {
                return Err(Error::key_serialization(format!(
                    "integer {} is too large to be a key",
                    number
                )));
            }
            let n = number.as_f64().ok_or_else(|| {
                Error::key_serialization(format!("number {} is not representable", number))
            })?;
            serialize_number(n)
        }
        Value::String(s) => {
            let mut out = String::with_capacity(s.len() + 1);
            out.push(STRING_TAG);
            out.push_str(s);
            Ok(out)
        }
        other => Err(Error::key_serialization(format!(
            "type of value not supported as a key: {}",
            type_name(other)
        ))),
    }
}

fn serialize_number(n: f64) -> Result<SerializedKey> {
    if !n.is_finite() {
        return Err(Error::key_serialization(format!(
            "non-finite number {} cannot be a key",
            n
        )));
    }
    // -0.0 and 0.0 must serialize identically
    let n = if n == 0.0 { 0.0 } else { n };
    let bits = n.to_bits();
    let ordered = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    Ok(format!("{}{:016x}", NUMBER_TAG, ordered))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Serialize a key against the shape of `key_path`
///
/// A single key path takes a scalar; a compound key path takes an array
/// with exactly one component per field.
///
/// # Errors
///
/// Returns `Error::KeySerialization` when the key does not match the key
/// path's shape or contains an unsupported component.
pub fn serialize_key_to_string(key: &KeyValue, key_path: &KeyPath) -> Result<SerializedKey> {
    match (key_path, key) {
        (KeyPath::Compound(fields), Value::Array(components)) => {
            if components.len() != fields.len() {
                return Err(Error::key_serialization(format!(
                    "compound key has {} components, key path {} needs {}",
                    components.len(),
                    key_path,
                    fields.len()
                )));
            }
            let parts = components
                .iter()
                .map(serialize_compound_component)
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(COMPOUND_SEPARATOR))
        }
        (KeyPath::Compound(_), _) => Err(Error::key_serialization(format!(
            "compound key path {} requires an array key",
            key_path
        ))),
        (KeyPath::Single(_), Value::Array(_)) => Err(Error::key_serialization(format!(
            "array key given for single key path {}",
            key_path
        ))),
        (KeyPath::Single(_), scalar) => serialize_value_to_orderable_string(scalar),
    }
}

fn serialize_compound_component(value: &Value) -> Result<SerializedKey> {
    if let Value::String(s) = value {
        if s.contains(['\u{0}', '\u{1}']) {
            return Err(Error::key_serialization(format!(
                "compound key component {:?} contains a reserved control character",
                s
            )));
        }
    }
    serialize_value_to_orderable_string(value)
}

/// Serialize each key of a list against `key_path`
///
/// # Errors
///
/// Fails on the first key that cannot be serialized.
pub fn form_list_of_serialized_keys(
    keys: &[KeyValue],
    key_path: &KeyPath,
) -> Result<Vec<SerializedKey>> {
    keys.iter()
        .map(|key| serialize_key_to_string(key, key_path))
        .collect()
}

/// Look up a (possibly dotted) field path inside a row
///
/// Returns `None` if any segment is missing or walks through a non-object.
pub fn get_value_for_single_keypath<'a>(row: &'a Row, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(row, |current, segment| current.as_object()?.get(segment))
}

/// Extract the key value a row carries at `key_path`
///
/// Compound key paths produce an array with one component per field.
/// Returns `None` if any field is missing.
pub fn get_key_for_keypath(row: &Row, key_path: &KeyPath) -> Option<KeyValue> {
    match key_path {
        KeyPath::Single(field) => get_value_for_single_keypath(row, field).cloned(),
        KeyPath::Compound(fields) => fields
            .iter()
            .map(|field| get_value_for_single_keypath(row, field).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
    }
}

/// Extract and serialize the key a row carries at `key_path`
///
/// # Errors
///
/// Returns `Error::KeySerialization` if the row has no value at the key
/// path or the value is not a valid key.
pub fn get_serialized_key_for_keypath(row: &Row, key_path: &KeyPath) -> Result<SerializedKey> {
    let key = get_key_for_keypath(row, key_path).ok_or_else(|| {
        Error::key_serialization(format!("row has no value at key path {}", key_path))
    })?;
    serialize_key_to_string(&key, key_path)
}

/// View a value as a list: arrays yield their elements, anything else is a
/// one-element list
pub fn arrayify(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}
