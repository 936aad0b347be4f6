//! Transaction semantics

use crate::common::*;
use serde_json::json;
use tidepool::{Error, QueryOptions, TransactionState};

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_put_then_get_inside_and_after_commit() {
    let provider = open_items();
    let row = json!({"id": "k1", "name": "first", "tags": ["a"], "text": "hello", "extra": {"n": 1.5}});

    let txn = provider.open_transaction(&["items"], true).unwrap();
    let items = txn.store("items").unwrap();
    items.put(row.clone()).unwrap();
    assert_eq!(items.get(&json!("k1")).unwrap(), Some(row.clone()));
    txn.commit();

    let reader = provider.open_transaction(&["items"], false).unwrap();
    assert_eq!(reader.store("items").unwrap().get(&json!("k1")).unwrap(), Some(row));
}

#[test]
fn test_get_multiple_omits_misses() {
    let provider = open_items();
    provider.put_multiple("items", vec![item("a", "x"), item("c", "y")]).unwrap();
    let rows = provider
        .get_multiple("items", &[json!("c"), json!("b"), json!("a")])
        .unwrap();
    assert_eq!(ids(&rows), vec!["c", "a"]);
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn test_overlapping_reader_does_not_see_uncommitted_put() {
    let provider = open_items_overlapping();
    let writer = provider.open_transaction(&["items"], true).unwrap();
    writer.store("items").unwrap().put(item("new", "n")).unwrap();

    let reader = provider.open_transaction(&["items"], false).unwrap();
    let items = reader.store("items").unwrap();
    assert_eq!(items.get(&json!("new")).unwrap(), None);

    writer.commit();
    // the reader keeps the snapshot it started from
    assert_eq!(items.get(&json!("new")).unwrap(), None);
    reader.commit();

    assert!(provider.get("items", &json!("new")).unwrap().is_some());
}

#[test]
fn test_overlapping_writers_keep_separate_forks() {
    let provider = open_items_overlapping();
    let first = provider.open_transaction(&["items"], true).unwrap();
    let second = provider.open_transaction(&["items"], true).unwrap();
    first.store("items").unwrap().put(item("one", "1")).unwrap();
    second.store("items").unwrap().put(item("two", "2")).unwrap();
    assert_eq!(second.store("items").unwrap().get(&json!("one")).unwrap(), None);

    first.commit();
    second.commit();
    assert_eq!(provider.count_all("items", None).unwrap(), 2);
}

#[test]
fn test_blocked_reader_is_denied_not_shown_pending_rows() {
    init_tracing();
    let provider = tidepool::MemoryProvider::with_config(
        tidepool::ProviderConfig::new().with_lock_timeout_ms(10),
    );
    provider.open("conformance", items_schema(), false, false).unwrap();

    let writer = provider.open_transaction(&["items"], true).unwrap();
    writer.store("items").unwrap().put(item("hidden", "h")).unwrap();
    let err = provider.get("items", &json!("hidden")).unwrap_err();
    assert!(matches!(err, Error::SchedulerDenied(_)));
    assert!(err.is_retryable());
    writer.commit();

    assert!(provider.get("items", &json!("hidden")).unwrap().is_some());
}

// ============================================================================
// Abort
// ============================================================================

#[test]
fn test_abort_leaves_committed_state_unchanged() {
    let provider = open_items();
    provider
        .put_multiple("items", vec![item("a", "x"), item("b", "y"), item("c", "z")])
        .unwrap();
    let before = provider.get_all("items", None, QueryOptions::new()).unwrap();

    let txn = provider.open_transaction(&["items"], true).unwrap();
    let items = txn.store("items").unwrap();
    items.put(item("d", "w")).unwrap();
    items.put(json!({"id": "a", "name": "changed", "tags": [], "text": ""})).unwrap();
    items.remove(&json!("b")).unwrap();
    items.clear_all_data().unwrap();
    txn.abort();

    assert_eq!(provider.get_all("items", None, QueryOptions::new()).unwrap(), before);
}

#[test]
fn test_closure_error_aborts() {
    let provider = open_items();
    let result = provider.transaction(&["items"], true, |txn| {
        txn.store("items")?.put(item("a", "x"))?;
        txn.store("items")?.put(json!({"name": "no id"}))
    });
    assert!(matches!(result, Err(Error::KeySerialization(_))));
    assert_eq!(provider.count_all("items", None).unwrap(), 0);
}

#[test]
fn test_rejection_leaves_transaction_usable() {
    let provider = open_items();
    let txn = provider.open_transaction(&["items"], true).unwrap();
    let items = txn.store("items").unwrap();
    assert!(items.get(&json!({"not": "a key"})).is_err());
    assert!(items.put(json!({"id": false})).is_err());
    items.put(item("ok", "fine")).unwrap();
    txn.commit();
    assert!(provider.get("items", &json!("ok")).unwrap().is_some());
}

// ============================================================================
// Tombstones
// ============================================================================

#[test]
fn test_commit_applies_tombstones() {
    let provider = open_items();
    provider.put_multiple("items", vec![item("a", "x"), item("b", "y")]).unwrap();

    provider
        .transaction(&["items"], true, |txn| txn.store("items")?.remove(&json!("a")))
        .unwrap();

    let txn = provider.open_transaction(&["items"], false).unwrap();
    let items = txn.store("items").unwrap();
    assert_eq!(items.get(&json!("a")).unwrap(), None);
    assert_eq!(items.open_primary_key().unwrap().count_all().unwrap(), 1);
}

#[test]
fn test_clear_then_put_commits_only_new_rows() {
    let provider = open_items();
    provider.put_multiple("items", vec![item("a", "x"), item("b", "y")]).unwrap();
    provider
        .transaction(&["items"], true, |txn| {
            let items = txn.store("items")?;
            items.clear_all_data()?;
            items.put(item("z", "only"))
        })
        .unwrap();
    let rows = provider.get_all("items", None, QueryOptions::new()).unwrap();
    assert_eq!(ids(&rows), vec!["z"]);
}

// ============================================================================
// Finalization
// ============================================================================

#[test]
fn test_store_operations_after_commit_fail() {
    let provider = open_items();
    let txn = provider.open_transaction(&["items"], true).unwrap();
    let items = txn.store("items").unwrap();
    let index = items.open_index("by_name").unwrap().unwrap();
    txn.commit();

    assert_eq!(items.get(&json!("a")), Err(Error::TransactionClosed));
    assert_eq!(items.get_multiple(&[json!("a")]), Err(Error::TransactionClosed));
    assert_eq!(items.put(item("a", "x")), Err(Error::TransactionClosed));
    assert_eq!(items.put_multiple(vec![]), Err(Error::TransactionClosed));
    assert_eq!(items.remove(&json!("a")), Err(Error::TransactionClosed));
    assert_eq!(items.remove_multiple(&[]), Err(Error::TransactionClosed));
    assert_eq!(items.clear_all_data(), Err(Error::TransactionClosed));
    assert!(matches!(items.open_index("by_name"), Err(Error::TransactionClosed)));
    assert_eq!(index.count_all(), Err(Error::TransactionClosed));
    assert_eq!(
        index.get_all(QueryOptions::new()),
        Err(Error::TransactionClosed)
    );
}

#[test]
fn test_store_operations_after_abort_fail() {
    let provider = open_items();
    let txn = provider.open_transaction(&["items"], true).unwrap();
    let items = txn.store("items").unwrap();
    txn.abort();
    assert_eq!(txn.state(), TransactionState::Aborted);
    assert_eq!(items.get(&json!("a")), Err(Error::TransactionClosed));
    assert!(matches!(items.open_primary_key(), Err(Error::TransactionClosed)));
}

#[test]
fn test_abort_without_any_store_access() {
    let provider = open_items();
    let txn = provider.open_transaction(&["items"], true).unwrap();
    txn.abort();
    assert!(txn.completion().outcome().is_some_and(|outcome| outcome.is_err()));
}

#[test]
fn test_store_outside_grant_is_not_found() {
    let provider = open_items();
    let txn = provider.open_transaction(&["items"], false).unwrap();
    assert!(matches!(txn.store("other"), Err(Error::NotFound(_))));
}
