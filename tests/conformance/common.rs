//! Shared fixtures for the conformance suite

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tidepool::{
    CompletionSignal, DbSchema, IndexSchema, LockScheduler, MemoryProvider, ProviderConfig,
    Result, StoreSchema, TransactionToken,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Store "items" keyed by `id`, with a few index flavours
pub fn items_schema() -> DbSchema {
    DbSchema::new().with_store(
        StoreSchema::new("items", "id")
            .with_index(IndexSchema::new("by_name", "name"))
            .with_index(IndexSchema::new("by_tags", "tags").multi_entry())
            .with_index(IndexSchema::new("by_text", "text").full_text()),
    )
}

pub fn open_items() -> MemoryProvider {
    init_tracing();
    let provider = MemoryProvider::new();
    provider.open("conformance", items_schema(), false, false).unwrap();
    provider
}

pub fn item(id: &str, name: &str) -> Value {
    json!({"id": id, "name": name, "tags": [], "text": ""})
}

pub fn ids(rows: &[Value]) -> Vec<&str> {
    rows.iter().map(|row| row["id"].as_str().unwrap()).collect()
}

/// Admits every request immediately, so writers and readers overlap
#[derive(Default)]
pub struct OpenDoorScheduler {
    next_id: AtomicU64,
}

impl LockScheduler for OpenDoorScheduler {
    fn open_transaction(&self, store_names: &[&str], write_needed: bool) -> Result<TransactionToken> {
        Ok(TransactionToken {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            store_names: store_names.iter().map(|s| s.to_string()).collect(),
            write_needed,
            completion: CompletionSignal::new(),
        })
    }

    fn transaction_complete(&self, token: &TransactionToken) {
        token.completion.resolve(Ok(()));
    }

    fn transaction_failed(&self, token: &TransactionToken, reason: &str) {
        token.completion.resolve(Err(tidepool::Error::aborted(reason)));
    }

    fn close(&self) {}
}

/// Provider whose scheduler lets transactions on the same store overlap
pub fn open_items_overlapping() -> MemoryProvider {
    init_tracing();
    let provider = MemoryProvider::with_config(ProviderConfig::default())
        .with_scheduler_factory(|_: &ProviderConfig| -> Arc<dyn LockScheduler> {
            Arc::new(OpenDoorScheduler::default())
        });
    provider.open("conformance", items_schema(), false, false).unwrap();
    provider
}
