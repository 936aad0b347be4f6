//! Stores and their per-transaction views
//!
//! Every transaction sees a store through a `StoreView`. A view starts out
//! sharing the committed snapshot (`Arc<RowMap>`) and forks on the first
//! mutation: it clones the snapshot into `merged` and records each change in
//! `pending`. Reads always go to `merged` once forked, so a transaction sees
//! its own writes. Commit replays `pending` onto the committed map; rollback
//! drops the fork.
//!
//! Opening an index also forks the view. Index derivation reads `merged`,
//! and forking pins the snapshot the index was opened against.

use crate::index::IndexView;
use crate::transaction::Transaction;
use std::collections::BTreeMap;
use std::sync::Arc;
use tidepool_core::codec::{
    form_list_of_serialized_keys, get_serialized_key_for_keypath, serialize_key_to_string,
};
use tidepool_core::{DbStore, KeyValue, Result, Row, RowMap, SerializedKey, StoreSchema};

// ============================================================================
// Pending changes
// ============================================================================

/// One recorded mutation of a forked view
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingChange {
    /// Insert or overwrite the row
    Put(Row),
    /// Delete the row
    Tombstone,
}

/// Changes keyed by serialized primary key; the latest change per key wins
pub(crate) type PendingChanges = BTreeMap<SerializedKey, PendingChange>;

/// What a commit applied to one store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CommitStats {
    pub puts: usize,
    pub deletes: usize,
}

/// Replay pending changes onto a committed map
pub(crate) fn apply_changes(rows: &mut RowMap, changes: PendingChanges) -> CommitStats {
    let mut stats = CommitStats::default();
    for (key, change) in changes {
        match change {
            PendingChange::Put(row) => {
                rows.insert(key, row);
                stats.puts += 1;
            }
            PendingChange::Tombstone => {
                rows.remove(&key);
                stats.deletes += 1;
            }
        }
    }
    stats
}

// ============================================================================
// StoreView
// ============================================================================

#[derive(Debug, Clone)]
struct Fork {
    merged: RowMap,
    pending: PendingChanges,
}

/// Copy-on-write view of one store inside one transaction
#[derive(Debug, Clone)]
pub(crate) struct StoreView {
    schema: Arc<StoreSchema>,
    committed: Arc<RowMap>,
    fork: Option<Fork>,
}

impl StoreView {
    pub(crate) fn new(schema: Arc<StoreSchema>, committed: Arc<RowMap>) -> Self {
        Self {
            schema,
            committed,
            fork: None,
        }
    }

    pub(crate) fn schema(&self) -> &Arc<StoreSchema> {
        &self.schema
    }

    pub(crate) fn is_forked(&self) -> bool {
        self.fork.is_some()
    }

    /// Rows as this transaction sees them
    pub(crate) fn merged(&self) -> &RowMap {
        match &self.fork {
            Some(fork) => &fork.merged,
            None => &self.committed,
        }
    }

    /// Fork off the committed snapshot if not already forked
    pub(crate) fn check_data_clone(&mut self) -> &mut RowMap {
        &mut self.fork_mut().merged
    }

    fn fork_mut(&mut self) -> &mut Fork {
        self.fork.get_or_insert_with(|| Fork {
            merged: (*self.committed).clone(),
            pending: PendingChanges::new(),
        })
    }

    pub(crate) fn put(&mut self, key: SerializedKey, row: Row) {
        let fork = self.fork_mut();
        fork.merged.insert(key.clone(), row.clone());
        fork.pending.insert(key, PendingChange::Put(row));
    }

    pub(crate) fn remove(&mut self, key: SerializedKey) {
        let fork = self.fork_mut();
        fork.merged.remove(&key);
        fork.pending.insert(key, PendingChange::Tombstone);
    }

    /// Tombstone every row currently visible
    pub(crate) fn clear(&mut self) {
        let fork = self.fork_mut();
        let keys: Vec<SerializedKey> = fork.merged.keys().cloned().collect();
        for key in keys {
            fork.pending.insert(key, PendingChange::Tombstone);
        }
        fork.merged.clear();
    }

    /// Hand over pending changes for commit and reset to unforked
    ///
    /// `None` if the view never forked or recorded nothing.
    pub(crate) fn take_changes(&mut self) -> Option<PendingChanges> {
        self.fork
            .take()
            .map(|fork| fork.pending)
            .filter(|pending| !pending.is_empty())
    }

    /// Discard the fork and any pending changes
    pub(crate) fn rollback(&mut self) {
        self.fork = None;
    }
}

// ============================================================================
// Store handle
// ============================================================================

/// A store as seen from inside one transaction
///
/// Every operation fails with `TransactionClosed` once the owning
/// transaction has committed or aborted.
pub struct Store<'a> {
    txn: &'a Transaction<'a>,
    name: String,
    schema: Arc<StoreSchema>,
}

impl<'a> Store<'a> {
    pub(crate) fn new(txn: &'a Transaction<'a>, name: &str, schema: Arc<StoreSchema>) -> Self {
        Self {
            txn,
            name: name.to_string(),
            schema,
        }
    }

    /// Store name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared schema of this store
    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Look up a row by primary key
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` after finalization and
    /// `KeySerialization` if `key` does not fit the primary key path.
    pub fn get(&self, key: &KeyValue) -> Result<Option<Row>> {
        self.txn.with_view(&self.name, |view| {
            let key = serialize_key_to_string(key, &self.schema.primary_key_path)?;
            Ok(view.merged().get(&key).cloned())
        })
    }

    /// Look up several rows; keys with no row are omitted
    ///
    /// # Errors
    ///
    /// Same as [`Store::get`]; any bad key fails the whole call.
    pub fn get_multiple(&self, keys: &[KeyValue]) -> Result<Vec<Row>> {
        self.txn.with_view(&self.name, |view| {
            let keys = form_list_of_serialized_keys(keys, &self.schema.primary_key_path)?;
            let rows = view.merged();
            Ok(keys.iter().filter_map(|key| rows.get(key).cloned()).collect())
        })
    }

    /// Insert or overwrite one row
    ///
    /// # Errors
    ///
    /// Returns `KeySerialization` if the row lacks a valid primary key.
    pub fn put(&self, row: Row) -> Result<()> {
        self.put_multiple(vec![row])
    }

    /// Insert or overwrite several rows
    ///
    /// Keys are derived before anything is written, so a row without a
    /// valid primary key leaves the view untouched.
    ///
    /// # Errors
    ///
    /// Returns `KeySerialization` if any row lacks a valid primary key.
    pub fn put_multiple(&self, rows: Vec<Row>) -> Result<()> {
        self.txn.with_view(&self.name, |view| {
            let keys = rows
                .iter()
                .map(|row| get_serialized_key_for_keypath(row, &self.schema.primary_key_path))
                .collect::<Result<Vec<_>>>()?;
            for (key, row) in keys.into_iter().zip(rows) {
                view.put(key, row);
            }
            Ok(())
        })
    }

    /// Delete one row; deleting a missing row is not an error
    ///
    /// # Errors
    ///
    /// Returns `KeySerialization` if `key` does not fit the primary key path.
    pub fn remove(&self, key: &KeyValue) -> Result<()> {
        self.remove_multiple(std::slice::from_ref(key))
    }

    /// Delete several rows
    ///
    /// # Errors
    ///
    /// Returns `KeySerialization` if any key does not fit.
    pub fn remove_multiple(&self, keys: &[KeyValue]) -> Result<()> {
        self.txn.with_view(&self.name, |view| {
            let keys = form_list_of_serialized_keys(keys, &self.schema.primary_key_path)?;
            for key in keys {
                view.remove(key);
            }
            Ok(())
        })
    }

    /// Delete every row visible to this transaction
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` after finalization.
    pub fn clear_all_data(&self) -> Result<()> {
        self.txn.with_view(&self.name, |view| {
            view.clear();
            Ok(())
        })
    }

    /// Index view over the primary key
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` after finalization.
    pub fn open_primary_key(&self) -> Result<IndexView<'a>> {
        self.txn.with_view(&self.name, |view| {
            view.check_data_clone();
            Ok(())
        })?;
        Ok(IndexView::new(
            self.txn,
            &self.name,
            Arc::clone(&self.schema),
            None,
        ))
    }

    /// Index view over a declared secondary index; `None` if undeclared
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` after finalization.
    pub fn open_index(&self, index_name: &str) -> Result<Option<IndexView<'a>>> {
        let index = self.txn.with_view(&self.name, |view| {
            let index = self.schema.index(index_name).cloned();
            if index.is_some() {
                view.check_data_clone();
            }
            Ok(index)
        })?;
        Ok(index.map(|index| {
            IndexView::new(self.txn, &self.name, Arc::clone(&self.schema), Some(index))
        }))
    }
}

impl std::fmt::Debug for Store<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("txn_id", &self.txn.id())
            .field("name", &self.name)
            .finish()
    }
}

impl<'a> DbStore for Store<'a> {
    type Index<'s> = IndexView<'a> where Self: 's;

    fn get(&self, key: &KeyValue) -> Result<Option<Row>> {
        Store::get(self, key)
    }

    fn get_multiple(&self, keys: &[KeyValue]) -> Result<Vec<Row>> {
        Store::get_multiple(self, keys)
    }

    fn put(&self, row: Row) -> Result<()> {
        Store::put(self, row)
    }

    fn put_multiple(&self, rows: Vec<Row>) -> Result<()> {
        Store::put_multiple(self, rows)
    }

    fn remove(&self, key: &KeyValue) -> Result<()> {
        Store::remove(self, key)
    }

    fn remove_multiple(&self, keys: &[KeyValue]) -> Result<()> {
        Store::remove_multiple(self, keys)
    }

    fn clear_all_data(&self) -> Result<()> {
        Store::clear_all_data(self)
    }

    fn open_primary_key(&self) -> Result<IndexView<'a>> {
        Store::open_primary_key(self)
    }

    fn open_index(&self, name: &str) -> Result<Option<IndexView<'a>>> {
        Store::open_index(self, name)
    }
}
