//! Transactions
//!
//! A transaction is admitted by the provider's lock scheduler, hands out
//! store handles, and is finalized exactly once:
//!
//! - `commit()` applies every forked view's pending changes to the
//!   committed maps and resolves the completion signal with `Ok(())`
//! - `abort()` discards every view and resolves the signal with
//!   `TransactionAborted`
//! - dropping a transaction that is still open commits it
//!
//! Operations issued after finalization fail with `TransactionClosed`.

use crate::provider::MemoryProvider;
use crate::store::{Store, StoreView};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tidepool_concurrency::{CompletionSignal, LockScheduler, TransactionToken};
use tidepool_core::{DbTransaction, Error, Result};
use tidepool_search::Tokenizer;
use tracing::{debug, warn};

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepting operations
    Open,
    /// Applying pending changes
    Committing,
    /// Changes applied
    Committed,
    /// Changes discarded
    Aborted,
}

struct TransactionInner {
    state: TransactionState,
    views: HashMap<String, StoreView>,
}

impl TransactionInner {
    fn ensure_open(&self) -> Result<()> {
        match self.state {
            TransactionState::Open => Ok(()),
            _ => Err(Error::TransactionClosed),
        }
    }
}

/// An admitted transaction over a fixed set of stores
///
/// Store handles and index views borrow the transaction, so they cannot
/// outlive it.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tidepool_core::{DbSchema, StoreSchema};
/// use tidepool_engine::MemoryProvider;
///
/// let provider = MemoryProvider::new();
/// let schema = DbSchema::new().with_store(StoreSchema::new("users", "id"));
/// provider.open("app", schema, false, false).unwrap();
///
/// let txn = provider.open_transaction(&["users"], true).unwrap();
/// txn.store("users").unwrap().put(json!({"id": 1, "name": "ada"})).unwrap();
/// txn.commit();
/// assert!(txn.completion().wait().is_ok());
///
/// assert!(provider.get("users", &json!(1)).unwrap().is_some());
/// ```
pub struct Transaction<'p> {
    provider: &'p MemoryProvider,
    epoch: u64,
    scheduler: Arc<dyn LockScheduler>,
    token: TransactionToken,
    inner: Mutex<TransactionInner>,
}

impl<'p> Transaction<'p> {
    pub(crate) fn new(
        provider: &'p MemoryProvider,
        epoch: u64,
        scheduler: Arc<dyn LockScheduler>,
        token: TransactionToken,
    ) -> Self {
        Self {
            provider,
            epoch,
            scheduler,
            token,
            inner: Mutex::new(TransactionInner {
                state: TransactionState::Open,
                views: HashMap::new(),
            }),
        }
    }

    /// Scheduler-assigned id
    pub fn id(&self) -> u64 {
        self.token.id
    }

    /// Stores this transaction was granted
    pub fn store_names(&self) -> &[String] {
        &self.token.store_names
    }

    /// Whether the transaction was admitted for writing
    pub fn is_write(&self) -> bool {
        self.token.write_needed
    }

    /// Current lifecycle state
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// True until commit or abort
    pub fn is_open(&self) -> bool {
        self.state() == TransactionState::Open
    }

    /// Signal resolved when the transaction finishes
    pub fn completion(&self) -> CompletionSignal {
        self.token.completion.clone()
    }

    pub(crate) fn tokenizer(&self) -> &'p dyn Tokenizer {
        self.provider.tokenizer()
    }

    /// Handle on one of the granted stores
    ///
    /// The first call for a store snapshots its committed rows.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` after finalization, `NotFound` if the
    /// store was not granted to this transaction or is not declared, and
    /// `ProviderClosed` if the provider has been closed.
    pub fn store(&self, name: &str) -> Result<Store<'_>> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        if !self.token.grants(name) {
            return Err(Error::not_found(format!(
                "store '{}' is not part of transaction {}",
                name, self.token.id
            )));
        }

        let schema = match inner.views.get(name) {
            Some(view) => Arc::clone(view.schema()),
            None => {
                let view = self.provider.with_store_data(self.epoch, name, |data| {
                    StoreView::new(Arc::clone(data.schema()), data.snapshot())
                })?;
                let schema = Arc::clone(view.schema());
                inner.views.insert(name.to_string(), view);
                schema
            }
        };
        Ok(Store::new(self, name, schema))
    }

    /// Run `f` against the view of `name` while the transaction is open
    pub(crate) fn with_view<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut StoreView) -> Result<R>,
    ) -> Result<R> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let view = inner
            .views
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("store '{}' has no open view", name)))?;
        f(view)
    }

    /// Apply pending changes and finish the transaction
    ///
    /// Does nothing if the transaction already finished. Changes for a
    /// database that was closed or replaced since admission are dropped
    /// with a warning.
    pub fn commit(&self) {
        let mut inner = self.inner.lock();
        if inner.state != TransactionState::Open {
            return;
        }
        inner.state = TransactionState::Committing;

        let mut puts = 0;
        let mut deletes = 0;
        for (name, mut view) in inner.views.drain() {
            let Some(changes) = view.take_changes() else {
                continue;
            };
            match self
                .provider
                .with_store_data(self.epoch, &name, |data| data.apply(changes))
            {
                Ok(stats) => {
                    puts += stats.puts;
                    deletes += stats.deletes;
                }
                Err(e) => {
                    warn!(
                        target: "tidepool::txn",
                        txn_id = self.token.id,
                        store = %name,
                        error = %e,
                        "Dropping changes for unavailable store"
                    );
                }
            }
        }

        inner.state = TransactionState::Committed;
        drop(inner);

        self.scheduler.transaction_complete(&self.token);
        debug!(
            target: "tidepool::txn",
            txn_id = self.token.id,
            puts,
            deletes,
            "Transaction committed"
        );
    }

    /// Discard pending changes and finish the transaction
    ///
    /// Never fails; does nothing if the transaction already finished.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        if inner.state != TransactionState::Open {
            return;
        }
        inner.state = TransactionState::Aborted;
        for view in inner.views.values_mut() {
            view.rollback();
        }
        inner.views.clear();
        drop(inner);

        self.scheduler
            .transaction_failed(&self.token, "transaction aborted");
        debug!(target: "tidepool::txn", txn_id = self.token.id, "Transaction aborted");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.is_open() {
            self.commit();
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.token.id)
            .field("stores", &self.token.store_names)
            .field("write", &self.token.write_needed)
            .field("state", &self.state())
            .finish()
    }
}

impl<'p> DbTransaction for Transaction<'p> {
    type Store<'t> = Store<'t> where Self: 't;
    type Completion = CompletionSignal;

    fn store(&self, name: &str) -> Result<Store<'_>> {
        Transaction::store(self, name)
    }

    fn abort(&self) {
        Transaction::abort(self)
    }

    fn completion(&self) -> CompletionSignal {
        Transaction::completion(self)
    }
}
