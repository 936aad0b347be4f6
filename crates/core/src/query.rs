//! Query option types shared by index views and providers

use serde::{Deserialize, Serialize};

/// Ordering and paging for index reads
///
/// `offset` and `limit` count distinct index keys, not rows: a key whose
/// bucket holds several rows contributes all of them to the result.
///
/// # Example
///
/// ```
/// use tidepool_core::QueryOptions;
///
/// let opts = QueryOptions::new().reverse().with_limit(10).with_offset(20);
/// assert!(opts.reverse);
/// assert_eq!(opts.limit, Some(10));
/// assert_eq!(opts.offset, 20);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Walk keys in descending order
    #[serde(default)]
    pub reverse: bool,
    /// Keep at most this many keys
    #[serde(default)]
    pub limit: Option<usize>,
    /// Skip this many leading keys
    #[serde(default)]
    pub offset: usize,
}

impl QueryOptions {
    /// Ascending, unlimited, no offset
    pub fn new() -> Self {
        Self::default()
    }

    /// Descending order
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Limit the number of keys
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip leading keys
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// How per-term matches combine in a full-text search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FullTextTermResolution {
    /// A row must match every term
    #[default]
    And,
    /// A row must match at least one term
    Or,
}
