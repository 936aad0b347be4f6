//! Combining per-term matches of a full-text search
//!
//! Each search term produces the rows it matched, keyed by serialized
//! primary key. Resolution folds those sets into one: intersection for
//! `And`, union for `Or`. The result stays keyed by primary key, so rows
//! come out de-duplicated and in primary-key order.

use std::collections::BTreeMap;
use tidepool_core::{FullTextTermResolution, Row, SerializedKey};

/// Rows matched by one term, keyed by serialized primary key
pub type TermMatches = BTreeMap<SerializedKey, Row>;

/// Fold per-term matches into the final match set
///
/// No terms means no matches, whatever the resolution.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use serde_json::json;
/// use tidepool_core::FullTextTermResolution;
/// use tidepool_search::resolve_terms;
///
/// let a: BTreeMap<_, _> = [("k1".to_string(), json!(1)), ("k2".to_string(), json!(2))].into();
/// let b: BTreeMap<_, _> = [("k2".to_string(), json!(2))].into();
///
/// let both = resolve_terms(vec![a.clone(), b.clone()], FullTextTermResolution::And);
/// assert_eq!(both.len(), 1);
///
/// let either = resolve_terms(vec![a, b], FullTextTermResolution::Or);
/// assert_eq!(either.len(), 2);
/// ```
pub fn resolve_terms(
    per_term: Vec<TermMatches>,
    resolution: FullTextTermResolution,
) -> TermMatches {
    let mut terms = per_term.into_iter();
    let Some(first) = terms.next() else {
        return TermMatches::new();
    };

    match resolution {
        FullTextTermResolution::And => terms.fold(first, |mut acc, next| {
            acc.retain(|key, _| next.contains_key(key));
            acc
        }),
        FullTextTermResolution::Or => terms.fold(first, |mut acc, next| {
            acc.extend(next);
            acc
        }),
    }
}
