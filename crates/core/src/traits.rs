//! Provider contract shared by every backing implementation
//!
//! These traits are the generic storage-provider shape: a provider hands out
//! transactions, a transaction hands out stores, a store hands out index
//! views. Handles borrow their parent, so a store cannot outlive its
//! transaction and a transaction cannot outlive its provider.
//!
//! All operations are synchronous and return `Result`; implementations
//! decide how finalization and waiting are modelled.

use crate::error::Result;
use crate::query::{FullTextTermResolution, QueryOptions};
use crate::schema::DbSchema;
use crate::types::{KeyPath, KeyValue, Row};

/// Top-level entry point owning the named stores of one schema
pub trait DbProvider {
    /// Transaction handle type
    type Transaction<'a>: DbTransaction
    where
        Self: 'a;

    /// Open (or re-open) the database described by `schema`
    ///
    /// # Errors
    ///
    /// Implementation specific; the in-memory provider never fails here.
    fn open(
        &self,
        schema_name: &str,
        schema: DbSchema,
        wipe_if_exists: bool,
        verbose: bool,
    ) -> Result<()>;

    /// Admit and start a transaction over `store_names`
    ///
    /// # Errors
    ///
    /// Returns `SchedulerDenied` if admission is refused and
    /// `ProviderClosed` if the provider is not open.
    fn open_transaction(
        &self,
        store_names: &[&str],
        write_needed: bool,
    ) -> Result<Self::Transaction<'_>>;

    /// Release all data
    ///
    /// # Errors
    ///
    /// Implementation specific; the in-memory provider never fails here.
    fn close(&self) -> Result<()>;
}

/// Short-lived coordination object bound to a set of stores
pub trait DbTransaction {
    /// Store handle type
    type Store<'t>: DbStore
    where
        Self: 't;

    /// Signal that resolves when the transaction has finished
    type Completion;

    /// Get a handle on one of the granted stores
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the store is not granted or not declared.
    fn store(&self, name: &str) -> Result<Self::Store<'_>>;

    /// Discard all pending writes and finish the transaction
    fn abort(&self);

    /// Completion signal for this transaction
    fn completion(&self) -> Self::Completion;
}

/// Read/write access to one store within a transaction
pub trait DbStore {
    /// Index view type
    type Index<'s>: DbIndex
    where
        Self: 's;

    /// Get a row by primary key
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn get(&self, key: &KeyValue) -> Result<Option<Row>>;

    /// Get the rows for several keys, silently omitting misses
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn get_multiple(&self, keys: &[KeyValue]) -> Result<Vec<Row>>;

    /// Insert or replace one row
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn put(&self, row: Row) -> Result<()>;

    /// Insert or replace several rows; the last write for a key wins
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn put_multiple(&self, rows: Vec<Row>) -> Result<()>;

    /// Remove a row by primary key; absent keys are not an error
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn remove(&self, key: &KeyValue) -> Result<()>;

    /// Remove several rows by primary key
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn remove_multiple(&self, keys: &[KeyValue]) -> Result<()>;

    /// Remove every row
    ///
    /// # Errors
    ///
    /// `TransactionClosed`.
    fn clear_all_data(&self) -> Result<()>;

    /// Index view over the primary key
    ///
    /// # Errors
    ///
    /// `TransactionClosed`.
    fn open_primary_key(&self) -> Result<Self::Index<'_>>;

    /// Index view over a declared secondary index, `None` if undeclared
    ///
    /// # Errors
    ///
    /// `TransactionClosed`.
    fn open_index(&self, name: &str) -> Result<Option<Self::Index<'_>>>;
}

/// Range/count queries over a derived key → rows mapping
pub trait DbIndex {
    /// Key path the index is keyed by
    fn key_path(&self) -> &KeyPath;

    /// Every row, ordered by index key
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn get_all(&self, opts: QueryOptions) -> Result<Vec<Row>>;

    /// Rows whose index key equals `key`
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn get_only(&self, key: &KeyValue, opts: QueryOptions) -> Result<Vec<Row>>;

    /// Rows whose index key lies between `low` and `high`
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn get_range(
        &self,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
        opts: QueryOptions,
    ) -> Result<Vec<Row>>;

    /// Number of distinct index keys
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn count_all(&self) -> Result<usize>;

    /// Number of distinct index keys equal to `key` (0 or 1)
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn count_only(&self, key: &KeyValue) -> Result<usize>;

    /// Number of distinct index keys in the range
    ///
    /// # Errors
    ///
    /// `TransactionClosed` or `KeySerialization`.
    fn count_range(
        &self,
        low: &KeyValue,
        high: &KeyValue,
        low_exclusive: bool,
        high_exclusive: bool,
    ) -> Result<usize>;

    /// Full-text search over a full-text index
    ///
    /// # Errors
    ///
    /// `TransactionClosed`, or `InvalidOperation` on a non full-text index.
    fn full_text_search(
        &self,
        phrase: &str,
        resolution: FullTextTermResolution,
        limit: Option<usize>,
    ) -> Result<Vec<Row>>;
}
