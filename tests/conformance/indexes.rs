//! Index semantics

use crate::common::*;
use serde_json::json;
use tidepool::{Error, FullTextTermResolution, QueryOptions};

// ============================================================================
// Range ordering
// ============================================================================

#[test]
fn test_range_ascending_and_reversed() {
    let provider = open_items();
    provider
        .put_multiple("items", vec![item("c", "3"), item("a", "1"), item("b", "2")])
        .unwrap();

    let forward = provider
        .get_range("items", None, &json!("a"), &json!("c"), false, true, QueryOptions::new())
        .unwrap();
    assert_eq!(ids(&forward), vec!["a", "b"]);

    let reversed = provider
        .get_range("items", None, &json!("a"), &json!("c"), false, true, QueryOptions::new().reverse())
        .unwrap();
    assert_eq!(ids(&reversed), vec!["b", "a"]);

    assert_eq!(
        provider
            .count_range("items", None, &json!("a"), &json!("c"), false, true)
            .unwrap(),
        2
    );
}

#[test]
fn test_numeric_keys_order_numerically() {
    let provider = tidepool::MemoryProvider::new();
    provider
        .open(
            "numbers",
            tidepool::DbSchema::new().with_store(tidepool::StoreSchema::new("n", "v")),
            false,
            false,
        )
        .unwrap();
    let values = [10.0, -2.5, 0.0, 3.0, -100.0, 2.0e9];
    provider
        .put_multiple("n", values.iter().map(|v| json!({"v": v})).collect())
        .unwrap();

    let rows = provider.get_all("n", None, QueryOptions::new()).unwrap();
    let seen: Vec<f64> = rows.iter().map(|r| r["v"].as_f64().unwrap()).collect();
    assert_eq!(seen, vec![-100.0, -2.5, 0.0, 3.0, 10.0, 2.0e9]);

    let between = provider
        .get_range("n", None, &json!(-3), &json!(3), false, false, QueryOptions::new())
        .unwrap();
    assert_eq!(between.len(), 3);
}

#[test]
fn test_degenerate_ranges_are_empty() {
    let provider = open_items();
    provider.put_multiple("items", vec![item("a", "1"), item("b", "2")]).unwrap();
    let range = |low: &str, high: &str, le: bool, he: bool| {
        provider
            .count_range("items", None, &json!(low), &json!(high), le, he)
            .unwrap()
    };
    assert_eq!(range("b", "a", false, false), 0);
    assert_eq!(range("a", "a", true, false), 0);
    assert_eq!(range("a", "a", false, true), 0);
    assert_eq!(range("a", "a", true, true), 0);
    assert_eq!(range("a", "a", false, false), 1);
}

// ============================================================================
// Multi-entry fan-out
// ============================================================================

#[test]
fn test_multi_entry_fan_out() {
    let provider = open_items();
    provider
        .put("items", json!({"id": "only", "name": "n", "tags": ["x", "y"], "text": ""}))
        .unwrap();

    let all = provider.get_all("items", Some("by_tags"), QueryOptions::new()).unwrap();
    assert_eq!(ids(&all), vec!["only", "only"]);
    assert_eq!(provider.count_all("items", Some("by_tags")).unwrap(), 2);
    assert_eq!(provider.count_all("items", None).unwrap(), 1);

    for tag in ["x", "y"] {
        let rows = provider
            .get_only("items", Some("by_tags"), &json!(tag), QueryOptions::new())
            .unwrap();
        assert_eq!(ids(&rows), vec!["only"]);
    }
}

// ============================================================================
// Offset / limit
// ============================================================================

#[test]
fn test_offset_and_limit_select_keys() {
    let provider = open_items();
    provider
        .put_multiple("items", vec![item("k1", "a"), item("k2", "b"), item("k3", "c")])
        .unwrap();
    let page = provider
        .get_all("items", None, QueryOptions::new().with_offset(1).with_limit(1))
        .unwrap();
    assert_eq!(ids(&page), vec!["k2"]);
}

#[test]
fn test_limit_counts_buckets_not_rows() {
    let provider = open_items();
    provider
        .put_multiple(
            "items",
            vec![item("1", "same"), item("2", "same"), item("3", "other")],
        )
        .unwrap();
    let rows = provider
        .get_all("items", Some("by_name"), QueryOptions::new().reverse().with_limit(1))
        .unwrap();
    assert_eq!(ids(&rows), vec!["1", "2"]);
}

// ============================================================================
// Missing indexes and key errors
// ============================================================================

#[test]
fn test_open_missing_index_is_absent() {
    let provider = open_items();
    let txn = provider.open_transaction(&["items"], false).unwrap();
    let items = txn.store("items").unwrap();
    assert!(items.open_index("nope").unwrap().is_none());
    assert!(items.open_index("by_name").unwrap().is_some());
}

#[test]
fn test_index_query_with_unindexable_row_fails_whole_query() {
    let provider = open_items();
    provider.put_multiple("items", vec![item("a", "x"), json!({"id": "b"})]).unwrap();
    let err = provider
        .get_all("items", Some("by_name"), QueryOptions::new())
        .unwrap_err();
    assert!(matches!(err, Error::KeySerialization(_)));
    assert!(!err.is_retryable());
}

// ============================================================================
// Full-text
// ============================================================================

#[test]
fn test_full_text_prefix_terms() {
    let provider = open_items();
    provider
        .put_multiple(
            "items",
            vec![
                json!({"id": "1", "name": "a", "tags": [], "text": "Running late again"}),
                json!({"id": "2", "name": "b", "tags": [], "text": "the runner ran"}),
                json!({"id": "3", "name": "c", "tags": [], "text": "nothing to see"}),
            ],
        )
        .unwrap();

    let run = provider
        .full_text_search("items", "by_text", "RUN", FullTextTermResolution::And, None)
        .unwrap();
    assert_eq!(ids(&run), vec!["1", "2"]);

    let both = provider
        .full_text_search("items", "by_text", "run late", FullTextTermResolution::And, None)
        .unwrap();
    assert_eq!(ids(&both), vec!["1"]);

    let either = provider
        .full_text_search("items", "by_text", "late see", FullTextTermResolution::Or, None)
        .unwrap();
    assert_eq!(ids(&either), vec!["1", "3"]);

    assert_eq!(provider.count_only("items", Some("by_text"), &json!("ran")).unwrap(), 1);
}
