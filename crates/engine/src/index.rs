//! Index engine
//!
//! Indexes are not maintained incrementally. Each query derives a sorted
//! `index key → rows` mapping from the store view's merged rows
//! (`calc_chunked_data`) and answers from it, so an index always reflects
//! the transaction's own writes.
//!
//! Key derivation per row:
//! - primary key: the row's serialized primary key
//! - full-text: one key per distinct word of the indexed text
//! - multi-entry: one key per element of the array at the key path; rows
//!   with nothing or `null` at the key path are skipped
//! - otherwise: the serialized key at the key path; a row without one fails
//!   the query with `KeySerialization`
//!
//! Paging (`reverse`, then `offset`, then `limit`) counts distinct index
//! keys, not rows. A key shared by several rows returns all of them.

use crate::transaction::Transaction;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tidepool_core::codec::{
    arrayify, get_serialized_key_for_keypath, get_value_for_single_keypath,
    serialize_key_to_string, serialize_value_to_orderable_string,
};
use tidepool_core::{
    DbIndex, Error, FullTextTermResolution, IndexSchema, KeyPath, KeyValue, QueryOptions, Result,
    Row, RowMap, SerializedKey, StoreSchema,
};
use tidepool_search::{resolve_terms, TermMatches, Tokenizer};
use tracing::trace;

/// Derived index contents: serialized index key → rows carrying it
pub(crate) type ChunkedData = BTreeMap<SerializedKey, Vec<Row>>;

// ============================================================================
// Derivation
// ============================================================================

/// Build the index mapping for `rows`; `None` indexes the primary key
///
/// # Errors
///
/// Returns `KeySerialization` if an ordinary index meets a row without a
/// valid key, or a multi-entry index is declared over a compound path.
pub(crate) fn calc_chunked_data(
    rows: &RowMap,
    index: Option<&IndexSchema>,
    tokenizer: &dyn Tokenizer,
) -> Result<ChunkedData> {
    let Some(index) = index else {
        return Ok(rows
            .iter()
            .map(|(key, row)| (key.clone(), vec![row.clone()]))
            .collect());
    };

    let mut chunks = ChunkedData::new();
    for row in rows.values() {
        for key in index_keys_for_row(row, index, tokenizer)? {
            chunks.entry(key).or_default().push(row.clone());
        }
    }
    Ok(chunks)
}

fn index_keys_for_row(
    row: &Row,
    index: &IndexSchema,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<SerializedKey>> {
    if index.full_text {
        return tokenizer
            .words_for_item(&index.key_path, row)
            .into_iter()
            .map(|word| serialize_value_to_orderable_string(&Value::String(word)))
            .collect();
    }

    if index.multi_entry {
        let KeyPath::Single(field) = &index.key_path else {
            return Err(Error::key_serialization(format!(
                "multi-entry index '{}' needs a single key path",
                index.name
            )));
        };
        let value = match get_value_for_single_keypath(row, field) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(value) => value,
        };
        let mut keys = arrayify(value)
            .into_iter()
            .map(|element| serialize_key_to_string(element, &index.key_path))
            .collect::<Result<Vec<_>>>()?;
        keys.sort();
        keys.dedup();
        return Ok(keys);
    }

    Ok(vec![get_serialized_key_for_keypath(row, &index.key_path)?])
}

// ============================================================================
// Selection
// ============================================================================

/// Serialized bounds of a range query
#[derive(Debug, Clone)]
struct KeyRange {
    low: SerializedKey,
    high: SerializedKey,
    low_exclusive: bool,
    high_exclusive: bool,
}

impl KeyRange {
    fn only(key: SerializedKey) -> Self {
        Self {
            low: key.clone(),
            high: key,
            low_exclusive: false,
            high_exclusive: false,
        }
    }

    /// True when no key can satisfy the bounds
    fn is_empty(&self) -> bool {
        self.low > self.high
            || (self.low == self.high && (self.low_exclusive || self.high_exclusive))
    }

    fn bounds(&self) -> (Bound<&str>, Bound<&str>) {
        (
            bound(&self.low, self.low_exclusive),
            bound(&self.high, self.high_exclusive),
        )
    }
}

fn bound(key: &str, exclusive: bool) -> Bound<&str> {
    if exclusive {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

/// Buckets in key order, optionally restricted to a range
fn select<'c>(chunks: &'c ChunkedData, range: Option<&KeyRange>) -> Vec<&'c Vec<Row>> {
    match range {
        None => chunks.values().collect(),
        Some(range) if range.is_empty() => Vec::new(),
        Some(range) => chunks
            .range::<str, _>(range.bounds())
            .map(|(_, rows)| rows)
            .collect(),
    }
}

/// Apply reverse, then offset, then limit over keys
fn page<T>(mut keys: Vec<T>, opts: &QueryOptions) -> Vec<T> {
    if opts.reverse {
        keys.reverse();
    }
    keys.into_iter()
        .skip(opts.offset)
        .take(opts.limit.unwrap_or(usize::MAX))
        .collect()
}

// ============================================================================
// IndexView
// ============================================================================

/// Query handle over a store's primary key or one of its indexes
///
/// The view is bound to the transaction that opened it and fails with
/// `TransactionClosed` once that transaction has finished.
pub struct IndexView<'a> {
    txn: &'a Transaction<'a>,
    store: String,
    schema: Arc<StoreSchema>,
    index: Option<IndexSchema>,
}

impl<'a> IndexView<'a> {
    pub(crate) fn new(
        txn: &'a Transaction<'a>,
        store: &str,
        schema: Arc<StoreSchema>,
        index: Option<IndexSchema>,
    ) -> Self {
        Self {
            txn,
            store: store.to_string(),
            schema,
            index,
        }
    }

    /// Index name, `None` for the primary key
    pub fn name(&self) -> Option<&str> {
        self.index.as_ref().map(|index| index.name.as_str())
    }

    /// Key path the view is keyed by
    pub fn key_path(&self) -> &KeyPath {
        match &self.index {
            Some(index) => &index.key_path,
            None => &self.schema.primary_key_path,
        }
    }

    /// True for full-text indexes
    pub fn is_full_text(&self) -> bool {
        self.index.as_ref().is_some_and(|index| index.full_text)
    }

    fn serialize(&self, key: &KeyValue) -> Result<SerializedKey> {
        serialize_key_to_string(key, self.key_path())
    }

    fn range(
        &self,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
    ) -> Result<KeyRange> {
        Ok(KeyRange {
            low: self.serialize(low)?,
            high: self.serialize(high)?,
            low_exclusive,
            high_exclusive,
        })
    }

    /// Derive the mapping from the current merged rows and run `f` on it
    fn with_chunks<R>(&self, f: impl FnOnce(&ChunkedData) -> Result<R>) -> Result<R> {
        let tokenizer = self.txn.tokenizer();
        self.txn.with_view(&self.store, |view| {
            let chunks = calc_chunked_data(view.merged(), self.index.as_ref(), tokenizer)?;
            trace!(
                target: "tidepool::index",
                store = %self.store,
                index = ?self.name(),
                keys = chunks.len(),
                "Derived index"
            );
            f(&chunks)
        })
    }

    fn query(&self, range: Option<KeyRange>, opts: &QueryOptions) -> Result<Vec<Row>> {
        self.with_chunks(|chunks| {
            Ok(page(select(chunks, range.as_ref()), opts)
                .into_iter()
                .flat_map(|rows| rows.iter().cloned())
                .collect())
        })
    }

    fn count(&self, range: Option<KeyRange>) -> Result<usize> {
        self.with_chunks(|chunks| Ok(select(chunks, range.as_ref()).len()))
    }

    /// Every row, in index key order
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` after finalization and `KeySerialization`
    /// if a row cannot be indexed.
    pub fn get_all(&self, opts: QueryOptions) -> Result<Vec<Row>> {
        self.query(None, &opts)
    }

    /// Rows whose index key equals `key`
    ///
    /// # Errors
    ///
    /// Also returns `KeySerialization` if `key` does not fit the key path.
    pub fn get_only(&self, key: &KeyValue, opts: QueryOptions) -> Result<Vec<Row>> {
        let range = KeyRange::only(self.serialize(key)?);
        self.query(Some(range), &opts)
    }

    /// Rows whose index key lies between `low` and `high`
    ///
    /// An inverted or empty range yields no rows.
    ///
    /// # Errors
    ///
    /// Also returns `KeySerialization` if either bound does not fit.
    pub fn get_range(
        &self,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
        opts: QueryOptions,
    ) -> Result<Vec<Row>> {
        let range = self.range(low, high, low_exclusive, high_exclusive)?;
        self.query(Some(range), &opts)
    }

    /// Number of distinct index keys
    ///
    /// # Errors
    ///
    /// Same as [`IndexView::get_all`].
    pub fn count_all(&self) -> Result<usize> {
        self.count(None)
    }

    /// 1 if any row carries `key`, else 0
    ///
    /// # Errors
    ///
    /// Same as [`IndexView::get_only`].
    pub fn count_only(&self, key: &KeyValue) -> Result<usize> {
        let range = KeyRange::only(self.serialize(key)?);
        self.count(Some(range))
    }

    /// Number of distinct index keys in the range
    ///
    /// # Errors
    ///
    /// Same as [`IndexView::get_range`].
    pub fn count_range(
        &self,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
    ) -> Result<usize> {
        let range = self.range(low, high, low_exclusive, high_exclusive)?;
        self.count(Some(range))
    }

    /// Rows matching a search phrase on a full-text index
    ///
    /// The phrase goes through the provider's tokenizer; every term matches
    /// indexed words it is a prefix of. `And` keeps rows matching every
    /// term, `Or` rows matching any. Results are in primary-key order and
    /// truncated to `limit`. A phrase without words matches nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` on a non full-text index and
    /// `TransactionClosed` after finalization.
    pub fn full_text_search(
        &self,
        phrase: &str,
        resolution: FullTextTermResolution,
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        if !self.is_full_text() {
            return Err(Error::invalid_operation(format!(
                "index {} on store '{}' is not a full-text index",
                self.name().unwrap_or("<primary key>"),
                self.store
            )));
        }

        let terms = self.txn.tokenizer().words_for_text(phrase);
        let primary_key_path = &self.schema.primary_key_path;

        let resolved = self.with_chunks(|chunks| {
            let per_term = terms
                .iter()
                .map(|term| -> Result<TermMatches> {
                    let prefix = serialize_value_to_orderable_string(&Value::String(term.clone()))?;
                    let mut matches = TermMatches::new();
                    let candidates = chunks
                        .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
                        .take_while(|(word, _)| word.starts_with(&prefix));
                    for (_, rows) in candidates {
                        for row in rows {
                            let key = get_serialized_key_for_keypath(row, primary_key_path)?;
                            matches.insert(key, row.clone());
                        }
                    }
                    Ok(matches)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(resolve_terms(per_term, resolution))
        })?;

        Ok(resolved
            .into_values()
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }
}

impl std::fmt::Debug for IndexView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexView")
            .field("txn_id", &self.txn.id())
            .field("store", &self.store)
            .field("index", &self.name())
            .finish()
    }
}

impl DbIndex for IndexView<'_> {
    fn key_path(&self) -> &KeyPath {
        IndexView::key_path(self)
    }

    fn get_all(&self, opts: QueryOptions) -> Result<Vec<Row>> {
        IndexView::get_all(self, opts)
    }

    fn get_only(&self, key: &KeyValue, opts: QueryOptions) -> Result<Vec<Row>> {
        IndexView::get_only(self, key, opts)
    }

    fn get_range(
        &self,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
        opts: QueryOptions,
    ) -> Result<Vec<Row>> {
        IndexView::get_range(self, low, high, low_exclusive, high_exclusive, opts)
    }

    fn count_all(&self) -> Result<usize> {
        IndexView::count_all(self)
    }

    fn count_only(&self, key: &KeyValue) -> Result<usize> {
        IndexView::count_only(self, key)
    }

    fn count_range(
        &self,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
    ) -> Result<usize> {
        IndexView::count_range(self, low, high, low_exclusive, high_exclusive)
    }

    fn full_text_search(
        &self,
        phrase: &str,
        resolution: FullTextTermResolution,
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        IndexView::full_text_search(self, phrase, resolution, limit)
    }
}
