//! Transactional in-memory provider for tidepool
//!
//! This crate ties the lower layers together:
//! - MemoryProvider: schema lifecycle, admission, one-shot operations
//! - Transaction: deferred auto-commit, explicit commit/abort
//! - Store: copy-on-write view of one store inside a transaction
//! - IndexView: queries over derived index mappings, full-text search
//! - ProviderConfig: TOML-loadable settings
//!
//! Every type implements the matching trait from `tidepool_core`, so code
//! written against `DbProvider` runs unchanged on this provider.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod index;
mod ops;
pub mod provider;
pub mod store;
pub mod transaction;

pub use config::ProviderConfig;
pub use index::IndexView;
pub use provider::{MemoryProvider, SchedulerFactory};
pub use store::Store;
pub use transaction::{Transaction, TransactionState};
