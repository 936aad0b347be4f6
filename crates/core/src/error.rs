//! Error types for tidepool
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every public operation returns `Result<T>`: either success or exactly one
//! tagged `Error`. Only `TransactionClosed` and `SchedulerDenied` are worth
//! retrying (with a fresh transaction); the others indicate caller misuse.

use thiserror::Error;

/// Result type alias for tidepool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the tidepool provider family
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A store or index operation was issued after its transaction
    /// committed or aborted
    #[error("Transaction is closed")]
    TransactionClosed,

    /// A key (or an item's key-path value) could not be serialized
    #[error("Key serialization error: {0}")]
    KeySerialization(String),

    /// Referenced store or index does not exist, or the store is not part
    /// of the transaction's granted set
    #[error("Not found: {0}")]
    NotFound(String),

    /// The lock scheduler refused or failed to admit a transaction
    #[error("Scheduler denied transaction: {0}")]
    SchedulerDenied(String),

    /// The transaction was aborted (outcome reported by completion signals)
    #[error("Transaction aborted: {reason}")]
    TransactionAborted {
        /// Human-readable reason for the abort
        reason: String,
    },

    /// Operation is not valid for the target (e.g. full-text search on a
    /// non full-text index)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The provider has not been opened, or has been closed
    #[error("Provider is closed")]
    ProviderClosed,

    /// Schema or configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a `KeySerialization` error
    pub fn key_serialization(msg: impl Into<String>) -> Self {
        Error::KeySerialization(msg.into())
    }

    /// Create a `NotFound` error
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Create a `SchedulerDenied` error
    pub fn scheduler_denied(reason: impl Into<String>) -> Self {
        Error::SchedulerDenied(reason.into())
    }

    /// Create an `InvalidOperation` error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    /// Create a `TransactionAborted` error
    pub fn aborted(reason: impl Into<String>) -> Self {
        Error::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Whether retrying with a fresh transaction can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransactionClosed | Error::SchedulerDenied(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
