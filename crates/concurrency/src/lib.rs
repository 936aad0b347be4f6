//! Concurrency layer for tidepool
//!
//! This crate admits and serializes transactions:
//! - LockScheduler: the admission contract used by providers
//! - StoreLockScheduler: FIFO read/write locking by store name
//! - TransactionToken: the admission receipt
//! - CompletionSignal: waitable commit/abort outcome per transaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;
pub mod signal;

pub use lock::{LockScheduler, StoreLockScheduler, TransactionToken};
pub use signal::CompletionSignal;
