//! In-memory provider
//!
//! `MemoryProvider` owns the committed rows of every store declared by the
//! open schema, one lock scheduler, and the tokenizer shared by all
//! full-text indexes.
//!
//! Committed rows live behind `RwLock<Arc<RowMap>>`. A transaction's first
//! access to a store clones the `Arc` (a snapshot, not a copy); commit
//! mutates through `Arc::make_mut`, which copies only while older
//! snapshots are still held.
//!
//! Lock order: transaction state → provider state → store rows. The
//! scheduler is cloned out of the provider state before blocking on
//! admission, so a waiting transaction never holds provider locks.

use crate::config::ProviderConfig;
use crate::store::{apply_changes, CommitStats, PendingChanges};
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tidepool_concurrency::{LockScheduler, StoreLockScheduler};
use tidepool_core::{DbProvider, DbSchema, Error, Result, RowMap, StoreSchema};
use tidepool_search::{Tokenizer, WordTokenizer};
use tracing::{debug, info};

/// Builds the lock scheduler for each newly opened schema
pub type SchedulerFactory = dyn Fn(&ProviderConfig) -> Arc<dyn LockScheduler> + Send + Sync;

fn default_scheduler(config: &ProviderConfig) -> Arc<dyn LockScheduler> {
    match config.lock_timeout() {
        Some(timeout) => Arc::new(StoreLockScheduler::with_timeout(timeout)),
        None => Arc::new(StoreLockScheduler::new()),
    }
}

// ============================================================================
// Store data
// ============================================================================

/// Committed rows of one store
pub(crate) struct StoreData {
    schema: Arc<StoreSchema>,
    rows: RwLock<Arc<RowMap>>,
}

impl StoreData {
    fn new(schema: StoreSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            rows: RwLock::new(Arc::new(RowMap::new())),
        }
    }

    pub(crate) fn schema(&self) -> &Arc<StoreSchema> {
        &self.schema
    }

    /// Current committed rows, shared
    pub(crate) fn snapshot(&self) -> Arc<RowMap> {
        Arc::clone(&self.rows.read())
    }

    pub(crate) fn apply(&self, changes: PendingChanges) -> CommitStats {
        let mut rows = self.rows.write();
        apply_changes(Arc::make_mut(&mut rows), changes)
    }
}

struct OpenDatabase {
    epoch: u64,
    name: String,
    schema: DbSchema,
    stores: HashMap<String, StoreData>,
    scheduler: Arc<dyn LockScheduler>,
    verbose: bool,
}

// ============================================================================
// MemoryProvider
// ============================================================================

/// Transactional in-memory key-value provider
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tidepool_core::{DbSchema, IndexSchema, QueryOptions, StoreSchema};
/// use tidepool_engine::MemoryProvider;
///
/// let schema = DbSchema::new().with_store(
///     StoreSchema::new("books", "isbn").with_index(IndexSchema::new("by_year", "year")),
/// );
/// let provider = MemoryProvider::new();
/// provider.open("library", schema, false, false).unwrap();
///
/// provider.put_multiple("books", vec![
///     json!({"isbn": "b", "year": 1999}),
///     json!({"isbn": "a", "year": 2004}),
/// ]).unwrap();
///
/// let recent = provider
///     .get_range("books", Some("by_year"), &json!(2000), &json!(2010), false, false, QueryOptions::new())
///     .unwrap();
/// assert_eq!(recent, vec![json!({"isbn": "a", "year": 2004})]);
/// ```
pub struct MemoryProvider {
    config: ProviderConfig,
    tokenizer: Arc<dyn Tokenizer>,
    scheduler_factory: Box<SchedulerFactory>,
    database: RwLock<Option<OpenDatabase>>,
    epochs: AtomicU64,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Provider with default configuration and the word tokenizer
    pub fn new() -> Self {
        Self::with_config(ProviderConfig::default())
    }

    /// Provider with the given configuration
    pub fn with_config(config: ProviderConfig) -> Self {
        Self {
            config,
            tokenizer: Arc::new(WordTokenizer),
            scheduler_factory: Box::new(default_scheduler),
            database: RwLock::new(None),
            epochs: AtomicU64::new(0),
        }
    }

    /// Replace the tokenizer used by full-text indexes
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Replace how lock schedulers are built on `open`
    pub fn with_scheduler_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Arc<dyn LockScheduler> + Send + Sync + 'static,
    {
        self.scheduler_factory = Box::new(factory);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub(crate) fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// True between `open` and `close`
    pub fn is_open(&self) -> bool {
        self.database.read().is_some()
    }

    /// Name and schema of the open database
    pub fn schema(&self) -> Option<(String, DbSchema)> {
        self.database
            .read()
            .as_ref()
            .map(|db| (db.name.clone(), db.schema.clone()))
    }

    /// Open the database described by `schema`
    ///
    /// Re-opening under the same name keeps existing data unless
    /// `wipe_if_exists` is set. Opening under a different name, or wiping,
    /// replaces every store with an empty one and starts a fresh lock
    /// scheduler; the old scheduler is closed, denying anything still
    /// waiting on it.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` is part of the provider contract.
    pub fn open(
        &self,
        schema_name: &str,
        schema: DbSchema,
        wipe_if_exists: bool,
        verbose: bool,
    ) -> Result<()> {
        let verbose = verbose || self.config.verbose;
        let mut database = self.database.write();

        if let Some(existing) = database.as_mut() {
            if existing.name == schema_name && !wipe_if_exists {
                existing.verbose = verbose;
                log_lifecycle(verbose, schema_name, "Reusing open database");
                return Ok(());
            }
            existing.scheduler.close();
        }

        let stores = schema
            .stores
            .iter()
            .map(|store| (store.name.clone(), StoreData::new(store.clone())))
            .collect();
        let scheduler = (self.scheduler_factory)(&self.config);
        let store_count = schema.stores.len();
        *database = Some(OpenDatabase {
            epoch: self.epochs.fetch_add(1, Ordering::Relaxed) + 1,
            name: schema_name.to_string(),
            schema,
            stores,
            scheduler,
            verbose,
        });
        drop(database);

        if verbose {
            info!(target: "tidepool::provider", schema = schema_name, stores = store_count, "Database opened");
        } else {
            debug!(target: "tidepool::provider", schema = schema_name, stores = store_count, "Database opened");
        }
        Ok(())
    }

    /// Admit a transaction over `store_names`, blocking until it may run
    ///
    /// # Errors
    ///
    /// Returns `ProviderClosed` if nothing is open and `SchedulerDenied`
    /// if admission is refused (empty request, timeout, provider closed
    /// while waiting).
    pub fn open_transaction(
        &self,
        store_names: &[&str],
        write_needed: bool,
    ) -> Result<Transaction<'_>> {
        let (epoch, scheduler) = {
            let database = self.database.read();
            let db = database.as_ref().ok_or(Error::ProviderClosed)?;
            (db.epoch, Arc::clone(&db.scheduler))
        };
        let token = scheduler.open_transaction(store_names, write_needed)?;
        Ok(Transaction::new(self, epoch, scheduler, token))
    }

    /// Run `f` in a transaction: commit on `Ok`, abort on `Err`
    ///
    /// # Errors
    ///
    /// Admission errors, or whatever `f` returns.
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    /// use tidepool_core::{DbSchema, StoreSchema};
    /// use tidepool_engine::MemoryProvider;
    ///
    /// let provider = MemoryProvider::new();
    /// provider
    ///     .open("app", DbSchema::new().with_store(StoreSchema::new("kv", "k")), false, false)
    ///     .unwrap();
    ///
    /// let count = provider
    ///     .transaction(&["kv"], true, |txn| {
    ///         let kv = txn.store("kv")?;
    ///         kv.put(json!({"k": "a"}))?;
    ///         kv.put(json!({"k": "b"}))?;
    ///         kv.open_primary_key()?.count_all()
    ///     })
    ///     .unwrap();
    /// assert_eq!(count, 2);
    /// ```
    pub fn transaction<F, T>(&self, store_names: &[&str], write_needed: bool, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let txn = self.open_transaction(store_names, write_needed)?;
        match f(&txn) {
            Ok(value) => {
                txn.commit();
                Ok(value)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    /// Release all data and deny further admissions
    ///
    /// Transactions still holding views keep their snapshots; their
    /// commits find no stores and are dropped.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` is part of the provider contract.
    pub fn close(&self) -> Result<()> {
        let Some(db) = self.database.write().take() else {
            return Ok(());
        };
        db.scheduler.close();
        log_lifecycle(db.verbose, &db.name, "Database closed");
        Ok(())
    }

    /// Run `f` on the committed data of store `name`
    ///
    /// `epoch` identifies the database the caller was admitted to; once that
    /// database has been closed or replaced this fails with `ProviderClosed`.
    pub(crate) fn with_store_data<R>(
        &self,
        epoch: u64,
        name: &str,
        f: impl FnOnce(&StoreData) -> R,
    ) -> Result<R> {
        let database = self.database.read();
        let db = database
            .as_ref()
            .filter(|db| db.epoch == epoch)
            .ok_or(Error::ProviderClosed)?;
        let data = db
            .stores
            .get(name)
            .ok_or_else(|| Error::not_found(format!("store '{}'", name)))?;
        Ok(f(data))
    }
}

fn log_lifecycle(verbose: bool, schema: &str, message: &str) {
    if verbose {
        info!(target: "tidepool::provider", schema, "{}", message);
    } else {
        debug!(target: "tidepool::provider", schema, "{}", message);
    }
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let database = self.database.read();
        f.debug_struct("MemoryProvider")
            .field("config", &self.config)
            .field("tokenizer", &self.tokenizer.name())
            .field("open", &database.as_ref().map(|db| db.name.as_str()))
            .finish()
    }
}

impl DbProvider for MemoryProvider {
    type Transaction<'a> = Transaction<'a>;

    fn open(
        &self,
        schema_name: &str,
        schema: DbSchema,
        wipe_if_exists: bool,
        verbose: bool,
    ) -> Result<()> {
        MemoryProvider::open(self, schema_name, schema, wipe_if_exists, verbose)
    }

    fn open_transaction(
        &self,
        store_names: &[&str],
        write_needed: bool,
    ) -> Result<Transaction<'_>> {
        MemoryProvider::open_transaction(self, store_names, write_needed)
    }

    fn close(&self) -> Result<()> {
        MemoryProvider::close(self)
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::MemoryProvider: Send, Sync);
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tidepool_core::StoreSchema;

    fn schema() -> DbSchema {
        DbSchema::new().with_store(StoreSchema::new("items", "id"))
    }

    #[test]
    fn test_closed_provider() {
        let provider = MemoryProvider::new();
        assert!(!provider.is_open());
        assert!(provider.schema().is_none());
        assert!(matches!(
            provider.open_transaction(&["items"], false),
            Err(Error::ProviderClosed)
        ));
        assert_eq!(provider.close(), Ok(()));
    }

    #[test]
    fn test_open_and_close() {
        let provider = MemoryProvider::new();
        provider.open("db", schema(), false, false).unwrap();
        assert!(provider.is_open());
        assert_eq!(provider.schema().map(|(name, _)| name), Some("db".to_string()));
        provider.close().unwrap();
        assert!(!provider.is_open());
    }

    #[test]
    fn test_reopen_same_name_keeps_data() {
        let provider = MemoryProvider::new();
        provider.open("db", schema(), false, false).unwrap();
        provider.put("items", json!({"id": 1})).unwrap();
        provider.open("db", schema(), false, true).unwrap();
        assert!(provider.get("items", &json!(1)).unwrap().is_some());
    }

    #[test]
    fn test_reopen_with_wipe_clears_data() {
        let provider = MemoryProvider::new();
        provider.open("db", schema(), false, false).unwrap();
        provider.put("items", json!({"id": 1})).unwrap();
        provider.open("db", schema(), true, false).unwrap();
        assert!(provider.get("items", &json!(1)).unwrap().is_none());
    }

    #[test]
    fn test_wipe_strands_in_flight_writer() {
        let provider = MemoryProvider::new();
        provider.open("db", schema(), false, false).unwrap();
        let txn = provider.open_transaction(&["items"], true).unwrap();
        txn.store("items").unwrap().put(json!({"id": 1})).unwrap();
        provider.open("db", schema(), true, false).unwrap();
        txn.commit();
        assert!(provider.get("items", &json!(1)).unwrap().is_none());
    }

    #[test]
    fn test_open_other_name_replaces_data() {
        let provider = MemoryProvider::new();
        provider.open("one", schema(), false, false).unwrap();
        provider.put("items", json!({"id": 1})).unwrap();
        provider.open("two", schema(), false, false).unwrap();
        assert_eq!(provider.count_all("items", None).unwrap(), 0);
    }

    #[test]
    fn test_empty_transaction_request_denied() {
        let provider = MemoryProvider::new();
        provider.open("db", schema(), false, false).unwrap();
        assert!(matches!(
            provider.open_transaction(&[], false),
            Err(Error::SchedulerDenied(_))
        ));
    }

    #[test]
    fn test_closure_transaction_aborts_on_error() {
        let provider = MemoryProvider::new();
        provider.open("db", schema(), false, false).unwrap();
        let result: Result<()> = provider.transaction(&["items"], true, |txn| {
            txn.store("items")?.put(json!({"id": 1}))?;
            Err(Error::invalid_operation("changed my mind"))
        });
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
        assert!(provider.get("items", &json!(1)).unwrap().is_none());
    }

    #[test]
    fn test_timeout_from_config() {
        let provider = MemoryProvider::with_config(ProviderConfig::new().with_lock_timeout_ms(20));
        provider.open("db", schema(), false, false).unwrap();
        let writer = provider.open_transaction(&["items"], true).unwrap();
        let err = provider.open_transaction(&["items"], false).unwrap_err();
        assert!(matches!(err, Error::SchedulerDenied(_)));
        writer.commit();
        assert!(provider.open_transaction(&["items"], false).is_ok());
    }

    struct DenyAll;

    impl LockScheduler for DenyAll {
        fn open_transaction(
            &self,
            _store_names: &[&str],
            _write_needed: bool,
        ) -> Result<tidepool_concurrency::TransactionToken> {
            Err(Error::scheduler_denied("read only"))
        }
        fn transaction_complete(&self, _token: &tidepool_concurrency::TransactionToken) {}
        fn transaction_failed(&self, _token: &tidepool_concurrency::TransactionToken, _reason: &str) {}
        fn close(&self) {}
    }

    #[test]
    fn test_custom_scheduler_factory() {
        let provider = MemoryProvider::new()
            .with_scheduler_factory(|_: &ProviderConfig| -> Arc<dyn LockScheduler> {
                Arc::new(DenyAll)
            });
        provider.open("db", schema(), false, false).unwrap();
        assert_eq!(
            provider.get("items", &json!(1)),
            Err(Error::scheduler_denied("read only"))
        );
    }

    #[test]
    fn test_close_denies_waiting_transaction() {
        let provider = MemoryProvider::new();
        provider.open("db", schema(), false, false).unwrap();
        let writer = provider.open_transaction(&["items"], true).unwrap();
        std::thread::scope(|s| {
            let waiter = s.spawn(|| provider.open_transaction(&["items"], true).map(|_| ()));
            std::thread::sleep(Duration::from_millis(20));
            provider.close().unwrap();
            assert!(matches!(waiter.join().unwrap(), Err(Error::SchedulerDenied(_))));
        });
        writer.commit();
    }
}
