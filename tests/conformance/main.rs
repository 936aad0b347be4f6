//! Provider Conformance Suite
//!
//! Cross-crate tests of the provider contract, driven through the
//! `tidepool` facade.
//!
//! ## Modules
//!
//! - `transactions`: round trip, isolation, abort, tombstones, finalization
//! - `indexes`: range ordering, multi-entry fan-out, key paging, missing indexes
//! - `configuration`: schema/config loading, custom tokenizers
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test conformance
//! cargo test --test conformance indexes::
//! ```

mod common;
mod configuration;
mod indexes;
mod transactions;
