//! Schema, configuration and tokenizer plumbing

use crate::common::*;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tidepool::{
    DbSchema, Error, FullTextTermResolution, KeyPath, MemoryProvider, ProviderConfig, Tokenizer,
};

#[test]
fn test_schema_from_toml_drives_provider() {
    let schema = DbSchema::from_toml_str(
        r#"
        [[stores]]
        name = "events"
        primary_key_path = ["day", "seq"]

        [[stores.indexes]]
        name = "by_kind"
        key_path = "meta.kind"
        "#,
    )
    .unwrap();
    assert_eq!(
        schema.store("events").unwrap().primary_key_path,
        KeyPath::compound(["day", "seq"])
    );

    let provider = MemoryProvider::new();
    provider.open("calendar", schema, false, false).unwrap();
    provider
        .put_multiple(
            "events",
            vec![
                json!({"day": "mon", "seq": 2, "meta": {"kind": "call"}}),
                json!({"day": "mon", "seq": 1, "meta": {"kind": "meet"}}),
                json!({"day": "tue", "seq": 1, "meta": {"kind": "call"}}),
            ],
        )
        .unwrap();

    assert!(provider.get("events", &json!(["mon", 1])).unwrap().is_some());
    assert_eq!(
        provider
            .count_only("events", Some("by_kind"), &json!("call"))
            .unwrap(),
        1
    );
    let calls = provider
        .get_only("events", Some("by_kind"), &json!("call"), tidepool::QueryOptions::new())
        .unwrap();
    assert_eq!(calls.len(), 2);
}

#[test]
fn test_provider_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "verbose = true").unwrap();
    writeln!(file, "lock_timeout_ms = 250").unwrap();

    let config = ProviderConfig::from_file(file.path()).unwrap();
    let provider = MemoryProvider::with_config(config);
    assert!(provider.config().verbose);
    provider.open("cfg", items_schema(), false, false).unwrap();
    assert_eq!(provider.schema().unwrap().0, "cfg");
}

#[test]
fn test_bad_schema_text_is_config_error() {
    assert!(matches!(
        DbSchema::from_json_str("{\"stores\": 1}"),
        Err(Error::Config(_))
    ));
}

/// Splits on commas, keeps case
struct CommaTokenizer;

impl Tokenizer for CommaTokenizer {
    fn words_for_text(&self, text: &str) -> Vec<String> {
        text.split(',')
            .map(str::trim)
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn name(&self) -> &str {
        "comma"
    }
}

#[test]
fn test_custom_tokenizer_is_used_for_index_and_phrase() {
    init_tracing();
    let provider = MemoryProvider::new().with_tokenizer(Arc::new(CommaTokenizer));
    provider.open("tok", items_schema(), false, false).unwrap();
    provider
        .put_multiple(
            "items",
            vec![
                json!({"id": "1", "name": "a", "tags": [], "text": "New York, Paris"}),
                json!({"id": "2", "name": "b", "tags": [], "text": "new york"}),
            ],
        )
        .unwrap();

    let hits = provider
        .full_text_search("items", "by_text", "New York", FullTextTermResolution::And, None)
        .unwrap();
    assert_eq!(ids(&hits), vec!["1"]);
}

#[test]
fn test_closed_provider_rejects_operations() {
    let provider = open_items();
    provider.close().unwrap();
    assert_eq!(provider.get("items", &json!("a")), Err(Error::ProviderClosed));
    assert!(!provider.is_open());
}
