//! Core value types for tidepool
//!
//! This module defines the foundational types shared by every crate:
//! - Row: an opaque structured record (JSON)
//! - KeyValue: a primary- or index-key value (scalar or compound)
//! - KeyPath: where a key lives inside a row (one field or an ordered list)
//! - SerializedKey / RowMap: the canonical, totally ordered key form and
//!   the map of rows keyed by it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One stored record. Rows are schema-less; they are usually JSON objects.
pub type Row = serde_json::Value;

/// A key value: a number or string for a single key path, or an array of
/// those for a compound key path.
pub type KeyValue = serde_json::Value;

/// Canonical string form of a key. Ordering of serialized keys is plain
/// byte-wise string ordering.
pub type SerializedKey = String;

/// Rows of one store, keyed by serialized primary key.
pub type RowMap = BTreeMap<SerializedKey, Row>;

/// Location of a key inside a row
///
/// Each field name may be a dotted path (`"author.name"`) that walks nested
/// objects.
///
/// # Example
///
/// ```
/// use tidepool_core::KeyPath;
///
/// let single: KeyPath = serde_json::from_str(r#""id""#).unwrap();
/// assert_eq!(single, KeyPath::single("id"));
///
/// let compound: KeyPath = serde_json::from_str(r#"["last", "first"]"#).unwrap();
/// assert!(compound.is_compound());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    /// One field
    Single(String),
    /// Ordered list of fields forming a compound key
    Compound(Vec<String>),
}

impl KeyPath {
    /// Key path over a single field
    pub fn single(field: impl Into<String>) -> Self {
        KeyPath::Single(field.into())
    }

    /// Key path over an ordered list of fields
    pub fn compound<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeyPath::Compound(fields.into_iter().map(Into::into).collect())
    }

    /// True for a compound key path
    pub fn is_compound(&self) -> bool {
        matches!(self, KeyPath::Compound(_))
    }

    /// The field names making up this key path, in order
    pub fn fields(&self) -> Vec<&str> {
        match self {
            KeyPath::Single(field) => vec![field.as_str()],
            KeyPath::Compound(fields) => fields.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Single(field) => write!(f, "{}", field),
            KeyPath::Compound(fields) => write!(f, "[{}]", fields.join(", ")),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(field: &str) -> Self {
        KeyPath::single(field)
    }
}
