//! Full-text infrastructure for tidepool
//!
//! This crate provides:
//! - Tokenizer trait for pluggable word derivation
//! - WordTokenizer default implementation (UAX#29 words, lowercased)
//! - resolve_terms for combining per-term matches (And / Or)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod resolve;
pub mod tokenizer;

pub use resolve::{resolve_terms, TermMatches};
pub use tokenizer::{Tokenizer, WordTokenizer};
