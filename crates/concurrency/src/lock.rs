//! Store-level lock scheduling
//!
//! Transactions declare up front which stores they touch and whether they
//! write. The scheduler admits them so that:
//!
//! - a writer is exclusive with every other transaction on the same store
//! - readers of a store share it
//! - requests are served in arrival order: a pending request reserves its
//!   stores, so later requests cannot overtake it
//!
//! Admission blocks the calling thread until the request can proceed, the
//! optional timeout elapses, or the scheduler is closed.

use crate::signal::{self, CompletionSignal};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tidepool_core::error::{Error, Result};
use tracing::{debug, trace};

/// Admission receipt for a granted transaction
#[derive(Debug, Clone)]
pub struct TransactionToken {
    /// Scheduler-unique transaction id
    pub id: u64,
    /// Stores the transaction was granted
    pub store_names: Vec<String>,
    /// Whether the grant is exclusive (write)
    pub write_needed: bool,
    /// Resolved when the transaction completes or fails
    pub completion: CompletionSignal,
}

impl TransactionToken {
    /// True if `name` is among the granted stores
    pub fn grants(&self, name: &str) -> bool {
        self.store_names.iter().any(|granted| granted == name)
    }
}

/// Serializes transactions by store name and read/write intent
pub trait LockScheduler: Send + Sync {
    /// Block until a transaction over `store_names` may proceed
    ///
    /// # Errors
    ///
    /// Returns `SchedulerDenied` if the request is invalid, times out, or
    /// the scheduler is closed.
    fn open_transaction(&self, store_names: &[&str], write_needed: bool)
        -> Result<TransactionToken>;

    /// Release the grant and resolve the completion signal successfully
    fn transaction_complete(&self, token: &TransactionToken);

    /// Release the grant and resolve the completion signal with `reason`
    fn transaction_failed(&self, token: &TransactionToken, reason: &str);

    /// Deny all pending and future requests
    fn close(&self);
}

#[derive(Debug)]
struct Request {
    id: u64,
    store_names: Vec<String>,
    write_needed: bool,
}

#[derive(Debug, Default)]
struct LockTable {
    next_id: u64,
    closed: bool,
    pending: VecDeque<Request>,
    read_locks: HashMap<String, usize>,
    write_locks: HashSet<String>,
    granted: HashMap<u64, Vec<String>>,
}

impl LockTable {
    /// Whether the pending request `id` can be granted now
    ///
    /// Walks the queue in order; requests ahead of `id` reserve their
    /// stores exactly as if they already held them.
    fn admissible(&self, id: u64) -> bool {
        let mut reserved_reads: HashSet<&str> = HashSet::new();
        let mut reserved_writes: HashSet<&str> = HashSet::new();

        for request in &self.pending {
            let blocked = request.store_names.iter().any(|name| {
                let name = name.as_str();
                let write_held =
                    self.write_locks.contains(name) || reserved_writes.contains(name);
                let read_held = self.read_locks.get(name).map_or(false, |n| *n > 0)
                    || reserved_reads.contains(name);
                write_held || (request.write_needed && read_held)
            });

            if request.id == id {
                return !blocked;
            }

            let reserved = if request.write_needed {
                &mut reserved_writes
            } else {
                &mut reserved_reads
            };
            reserved.extend(request.store_names.iter().map(String::as_str));
        }
        false
    }

    fn grant(&mut self, id: u64) -> Option<Request> {
        let position = self.pending.iter().position(|r| r.id == id)?;
        let request = self.pending.remove(position)?;
        for name in &request.store_names {
            if request.write_needed {
                self.write_locks.insert(name.clone());
            } else {
                *self.read_locks.entry(name.clone()).or_insert(0) += 1;
            }
        }
        self.granted.insert(id, request.store_names.clone());
        Some(request)
    }

    fn withdraw(&mut self, id: u64) {
        self.pending.retain(|r| r.id != id);
    }

    fn release(&mut self, token: &TransactionToken) -> bool {
        if self.granted.remove(&token.id).is_none() {
            return false;
        }
        for name in &token.store_names {
            if token.write_needed {
                self.write_locks.remove(name);
            } else if let Some(count) = self.read_locks.get_mut(name) {
                *count -= 1;
                if *count == 0 {
                    self.read_locks.remove(name);
                }
            }
        }
        true
    }
}

/// Default FIFO scheduler over store names
///
/// # Example
///
/// ```
/// use tidepool_concurrency::{LockScheduler, StoreLockScheduler};
///
/// let scheduler = StoreLockScheduler::new();
/// let reader = scheduler.open_transaction(&["users"], false).unwrap();
/// let other_reader = scheduler.open_transaction(&["users"], false).unwrap();
/// scheduler.transaction_complete(&reader);
/// scheduler.transaction_complete(&other_reader);
/// assert!(reader.completion.wait().is_ok());
/// ```
#[derive(Debug, Default)]
pub struct StoreLockScheduler {
    table: Mutex<LockTable>,
    changed: Condvar,
    timeout: Option<Duration>,
}

impl StoreLockScheduler {
    /// Scheduler that waits indefinitely for admission
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler that denies requests not admitted within `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    /// Number of currently granted transactions
    pub fn active_count(&self) -> usize {
        self.table.lock().granted.len()
    }

    /// Number of requests waiting for admission
    pub fn pending_count(&self) -> usize {
        self.table.lock().pending.len()
    }

    fn finish(&self, token: &TransactionToken, outcome: Result<()>) {
        let released = self.table.lock().release(token);
        if released {
            self.changed.notify_all();
        }
        token.completion.resolve(outcome);
    }
}

impl LockScheduler for StoreLockScheduler {
    fn open_transaction(
        &self,
        store_names: &[&str],
        write_needed: bool,
    ) -> Result<TransactionToken> {
        if store_names.is_empty() {
            return Err(Error::scheduler_denied("no stores requested"));
        }

        let mut names: Vec<String> = store_names.iter().map(|s| s.to_string()).collect();
        names.sort();
        names.dedup();

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut table = self.table.lock();
        if table.closed {
            return Err(Error::scheduler_denied("scheduler is closed"));
        }

        table.next_id += 1;
        let id = table.next_id;
        table.pending.push_back(Request {
            id,
            store_names: names,
            write_needed,
        });
        trace!(target: "tidepool::lock", txn_id = id, write_needed, "Queued transaction");

        loop {
            if table.closed {
                table.withdraw(id);
                return Err(Error::scheduler_denied("scheduler is closed"));
            }
            if table.admissible(id) {
                break;
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut table, deadline).timed_out()
                        && !table.admissible(id)
                    {
                        table.withdraw(id);
                        drop(table);
                        // a withdrawn request may have been blocking others
                        self.changed.notify_all();
                        debug!(target: "tidepool::lock", txn_id = id, "Admission timed out");
                        return Err(Error::scheduler_denied("timed out waiting for store locks"));
                    }
                }
                None => self.changed.wait(&mut table),
            }
        }

        let request = table
            .grant(id)
            .ok_or_else(|| Error::scheduler_denied("request vanished from queue"))?;
        drop(table);

        debug!(
            target: "tidepool::lock",
            txn_id = id,
            stores = ?request.store_names,
            write_needed,
            "Transaction admitted"
        );

        Ok(TransactionToken {
            id,
            store_names: request.store_names,
            write_needed,
            completion: CompletionSignal::new(),
        })
    }

    fn transaction_complete(&self, token: &TransactionToken) {
        trace!(target: "tidepool::lock", txn_id = token.id, "Transaction complete");
        self.finish(token, Ok(()));
    }

    fn transaction_failed(&self, token: &TransactionToken, reason: &str) {
        debug!(target: "tidepool::lock", txn_id = token.id, reason, "Transaction failed");
        self.finish(token, signal::aborted(reason));
    }

    fn close(&self) {
        let mut table = self.table.lock();
        table.closed = true;
        drop(table);
        self.changed.notify_all();
    }
}
