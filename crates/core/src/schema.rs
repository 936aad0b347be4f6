//! Database schema shapes
//!
//! Schemas are consumed, not validated: a schema names its stores, each
//! store's primary key path and its secondary indexes. Schemas can be built
//! in code or loaded from TOML/JSON.
//!
//! ```toml
//! version = 1
//!
//! [[stores]]
//! name = "books"
//! primary_key_path = "id"
//!
//! [[stores.indexes]]
//! name = "by_tag"
//! key_path = "tags"
//! multi_entry = true
//! ```

use crate::error::Result;
use crate::types::KeyPath;
use serde::{Deserialize, Serialize};

/// Secondary index definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name, unique within its store
    pub name: String,
    /// Where the indexed value lives in each row
    pub key_path: KeyPath,
    /// Declared uniqueness (carried for the provider contract)
    #[serde(default)]
    pub unique: bool,
    /// The indexed field is a collection; each element is one index key
    #[serde(default)]
    pub multi_entry: bool,
    /// The indexed field is text; each word is one index key
    #[serde(default)]
    pub full_text: bool,
}

impl IndexSchema {
    /// Ordinary (single-key) index
    pub fn new(name: impl Into<String>, key_path: impl Into<KeyPath>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
            multi_entry: false,
            full_text: false,
        }
    }

    /// Mark the index unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the index multi-entry
    pub fn multi_entry(mut self) -> Self {
        self.multi_entry = true;
        self
    }

    /// Mark the index full-text
    pub fn full_text(mut self) -> Self {
        self.full_text = true;
        self
    }
}

/// Store (collection) definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    /// Store name
    pub name: String,
    /// Primary key path
    pub primary_key_path: KeyPath,
    /// Secondary indexes
    #[serde(default)]
    pub indexes: Vec<IndexSchema>,
}

impl StoreSchema {
    /// Store with no secondary indexes
    pub fn new(name: impl Into<String>, primary_key_path: impl Into<KeyPath>) -> Self {
        Self {
            name: name.into(),
            primary_key_path: primary_key_path.into(),
            indexes: Vec::new(),
        }
    }

    /// Add a secondary index
    pub fn with_index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up an index definition by name
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

/// Whole-database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSchema {
    /// Schema version (informational for the in-memory backend)
    #[serde(default = "default_version")]
    pub version: u32,
    /// Declared stores
    #[serde(default)]
    pub stores: Vec<StoreSchema>,
}

fn default_version() -> u32 {
    1
}

impl Default for DbSchema {
    fn default() -> Self {
        Self {
            version: default_version(),
            stores: Vec::new(),
        }
    }
}

impl DbSchema {
    /// Empty schema at version 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema version
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add a store
    pub fn with_store(mut self, store: StoreSchema) -> Self {
        self.stores.push(store);
        self
    }

    /// Look up a store definition by name
    pub fn store(&self, name: &str) -> Option<&StoreSchema> {
        self.stores.iter().find(|store| store.name == name)
    }

    /// Parse a schema from TOML
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not a valid schema.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Parse a schema from JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not a valid schema.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
