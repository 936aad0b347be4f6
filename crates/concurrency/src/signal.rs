//! One-shot completion signal for transactions
//!
//! A `CompletionSignal` is resolved exactly once by the lock scheduler:
//! `Ok(())` when the transaction's writes have been applied to the committed
//! maps, `Err(TransactionAborted)` when it was aborted. Clones share the
//! same outcome, so callers can hand the signal to another thread and wait
//! there.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tidepool_core::error::{Error, Result};

#[derive(Debug, Default)]
struct SignalState {
    outcome: Mutex<Option<Result<()>>>,
    resolved: Condvar,
}

/// Waitable, clonable transaction outcome
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    state: Arc<SignalState>,
}

impl CompletionSignal {
    /// Create an unresolved signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the signal; later calls are ignored
    ///
    /// Returns true if this call set the outcome.
    pub fn resolve(&self, outcome: Result<()>) -> bool {
        let mut slot = self.state.outcome.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.state.resolved.notify_all();
        true
    }

    /// True once an outcome has been set
    pub fn is_resolved(&self) -> bool {
        self.state.outcome.lock().is_some()
    }

    /// The outcome, if resolved
    pub fn outcome(&self) -> Option<Result<()>> {
        self.state.outcome.lock().clone()
    }

    /// Block until resolved and return the outcome
    ///
    /// # Errors
    ///
    /// Returns `TransactionAborted` if the transaction was aborted.
    pub fn wait(&self) -> Result<()> {
        let mut slot = self.state.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.state.resolved.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`; `None` if still unresolved
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let mut slot = self.state.outcome.lock();
        if slot.is_none() {
            self.state.resolved.wait_while_for(&mut slot, |o| o.is_none(), timeout);
        }
        slot.clone()
    }
}

/// A resolved error outcome for an aborted transaction
pub(crate) fn aborted(reason: &str) -> Result<()> {
    Err(Error::aborted(reason))
}
