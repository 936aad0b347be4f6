//! Tidepool - transactional in-memory key-value provider
//!
//! Tidepool keeps named stores of JSON rows in memory and serves them
//! through short-lived transactions with copy-on-write isolation. Secondary
//! indexes (ordinary, compound, multi-entry and full-text) are derived from
//! the rows on every query, so they always reflect the transaction's own
//! uncommitted writes.
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use tidepool::{DbSchema, IndexSchema, MemoryProvider, QueryOptions, StoreSchema};
//!
//! let schema = DbSchema::new().with_store(
//!     StoreSchema::new("users", "id").with_index(IndexSchema::new("by_city", "city")),
//! );
//!
//! let provider = MemoryProvider::new();
//! provider.open("app", schema, false, false)?;
//!
//! provider.transaction(&["users"], true, |txn| {
//!     let users = txn.store("users")?;
//!     users.put(json!({"id": 1, "city": "Lisbon"}))?;
//!     users.put(json!({"id": 2, "city": "Oslo"}))?;
//!     Ok(())
//! })?;
//!
//! let oslo = provider.get_only("users", Some("by_city"), &json!("Oslo"), QueryOptions::new())?;
//! assert_eq!(oslo.len(), 1);
//! # Ok::<(), tidepool::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `tidepool-core`: rows, key paths, schema, key codec, errors, provider traits
//! - `tidepool-concurrency`: lock scheduling and completion signals
//! - `tidepool-search`: tokenizer and full-text term resolution
//! - `tidepool-engine`: the in-memory provider itself

pub use tidepool_concurrency::{CompletionSignal, LockScheduler, StoreLockScheduler, TransactionToken};
pub use tidepool_core::codec;
pub use tidepool_core::{
    DbIndex, DbProvider, DbSchema, DbStore, DbTransaction, Error, FullTextTermResolution,
    IndexSchema, KeyPath, KeyValue, QueryOptions, Result, Row, RowMap, SerializedKey, StoreSchema,
};
pub use tidepool_engine::{
    IndexView, MemoryProvider, ProviderConfig, SchedulerFactory, Store, Transaction,
    TransactionState,
};
pub use tidepool_search::{Tokenizer, WordTokenizer};
