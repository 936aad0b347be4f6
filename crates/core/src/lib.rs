//! Core types and traits for tidepool
//!
//! This crate defines the foundational types used throughout the system:
//! - Row / KeyValue: JSON rows and key values
//! - KeyPath: where keys live inside rows (single or compound, dotted)
//! - Schema: DbSchema / StoreSchema / IndexSchema
//! - Codec: order-preserving key serialization
//! - QueryOptions / FullTextTermResolution: index query parameters
//! - Error: error type hierarchy
//! - Traits: the provider contract (DbProvider, DbTransaction, DbStore, DbIndex)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod query;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use query::{FullTextTermResolution, QueryOptions};
pub use schema::{DbSchema, IndexSchema, StoreSchema};
pub use traits::{DbIndex, DbProvider, DbStore, DbTransaction};
pub use types::{KeyPath, KeyValue, Row, RowMap, SerializedKey};
