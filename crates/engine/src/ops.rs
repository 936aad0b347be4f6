//! One-shot provider operations
//!
//! Each call runs in its own transaction: reads take a shared lock on the
//! store, writes an exclusive one. The transaction commits when the
//! operation succeeds and aborts when it fails. `index` selects a declared
//! secondary index; `None` queries the primary key.

use crate::index::IndexView;
use crate::provider::MemoryProvider;
use tidepool_core::{Error, FullTextTermResolution, KeyValue, QueryOptions, Result, Row};

impl MemoryProvider {
    fn read_index<T>(
        &self,
        store: &str,
        index: Option<&str>,
        f: impl FnOnce(&IndexView<'_>) -> Result<T>,
    ) -> Result<T> {
        self.transaction(&[store], false, |txn| {
            let handle = txn.store(store)?;
            let view = match index {
                None => handle.open_primary_key()?,
                Some(name) => handle.open_index(name)?.ok_or_else(|| {
                    Error::not_found(format!("index '{}' on store '{}'", name, store))
                })?,
            };
            f(&view)
        })
    }

    /// Row with primary key `key`
    ///
    /// # Errors
    ///
    /// Admission errors, `NotFound` for an undeclared store and
    /// `KeySerialization` for a bad key.
    pub fn get(&self, store: &str, key: &KeyValue) -> Result<Option<Row>> {
        self.transaction(&[store], false, |txn| txn.store(store)?.get(key))
    }

    /// Rows for several primary keys, omitting misses
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get`].
    pub fn get_multiple(&self, store: &str, keys: &[KeyValue]) -> Result<Vec<Row>> {
        self.transaction(&[store], false, |txn| txn.store(store)?.get_multiple(keys))
    }

    /// Insert or overwrite one row
    ///
    /// # Errors
    ///
    /// Admission errors, `NotFound` for an undeclared store and
    /// `KeySerialization` if the row has no valid primary key.
    pub fn put(&self, store: &str, row: Row) -> Result<()> {
        self.transaction(&[store], true, |txn| txn.store(store)?.put(row))
    }

    /// Insert or overwrite several rows atomically
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::put`]; nothing is written on failure.
    pub fn put_multiple(&self, store: &str, rows: Vec<Row>) -> Result<()> {
        self.transaction(&[store], true, |txn| txn.store(store)?.put_multiple(rows))
    }

    /// Delete the row with primary key `key`
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get`].
    pub fn remove(&self, store: &str, key: &KeyValue) -> Result<()> {
        self.transaction(&[store], true, |txn| txn.store(store)?.remove(key))
    }

    /// Delete several rows atomically
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get`].
    pub fn remove_multiple(&self, store: &str, keys: &[KeyValue]) -> Result<()> {
        self.transaction(&[store], true, |txn| txn.store(store)?.remove_multiple(keys))
    }

    /// Delete every row of `store`
    ///
    /// # Errors
    ///
    /// Admission errors or `NotFound` for an undeclared store.
    pub fn clear_all_data(&self, store: &str) -> Result<()> {
        self.transaction(&[store], true, |txn| txn.store(store)?.clear_all_data())
    }

    /// Every row in index order
    ///
    /// # Errors
    ///
    /// Admission errors, `NotFound` for an undeclared store or index, and
    /// `KeySerialization` if a row cannot be indexed.
    pub fn get_all(
        &self,
        store: &str,
        index: Option<&str>,
        opts: QueryOptions,
    ) -> Result<Vec<Row>> {
        self.read_index(store, index, |view| view.get_all(opts))
    }

    /// Rows whose index key equals `key`
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get_all`].
    pub fn get_only(
        &self,
        store: &str,
        index: Option<&str>,
        key: &KeyValue,
        opts: QueryOptions,
    ) -> Result<Vec<Row>> {
        self.read_index(store, index, |view| view.get_only(key, opts))
    }

    /// Rows whose index key lies in the range
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get_all`].
    #[allow(clippy::too_many_arguments)]
    pub fn get_range(
        &self,
        store: &str,
        index: Option<&str>,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
        opts: QueryOptions,
    ) -> Result<Vec<Row>> {
        self.read_index(store, index, |view| {
            view.get_range(low, high, low_exclusive, high_exclusive, opts)
        })
    }

    /// Number of distinct index keys
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get_all`].
    pub fn count_all(&self, store: &str, index: Option<&str>) -> Result<usize> {
        self.read_index(store, index, |view| view.count_all())
    }

    /// 1 if any row carries `key`, else 0
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get_all`].
    pub fn count_only(&self, store: &str, index: Option<&str>, key: &KeyValue) -> Result<usize> {
        self.read_index(store, index, |view| view.count_only(key))
    }

    /// Number of distinct index keys in the range
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::get_all`].
    pub fn count_range(
        &self,
        store: &str,
        index: Option<&str>,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
    ) -> Result<usize> {
        self.read_index(store, index, |view| {
            view.count_range(low, high, low_exclusive, high_exclusive)
        })
    }

    /// Search a full-text index
    ///
    /// # Errors
    ///
    /// Admission errors, `NotFound` for an undeclared store or index, and
    /// `InvalidOperation` if the index is not full-text.
    pub fn full_text_search(
        &self,
        store: &str,
        index: &str,
        phrase: &str,
        resolution: FullTextTermResolution,
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        self.read_index(store, Some(index), |view| {
            view.full_text_search(phrase, resolution, limit)
        })
    }
}
