//! Provider configuration
//!
//! Settings can be built in code or loaded from a TOML file:
//!
//! ```toml
//! # Log lifecycle events at info level instead of debug
//! verbose = false
//!
//! # Give up waiting for store locks after this many milliseconds.
//! # Omit to wait indefinitely.
//! lock_timeout_ms = 5000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tidepool_core::{Error, Result};

/// Configuration for a [`MemoryProvider`](crate::MemoryProvider)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Log lifecycle events at info level
    #[serde(default)]
    pub verbose: bool,
    /// Admission timeout for the default lock scheduler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// Default configuration: quiet, no admission timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbose logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the admission timeout in milliseconds
    pub fn with_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = Some(timeout_ms);
        self
    }

    /// Admission timeout as a `Duration`
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not valid configuration.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse configuration from a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}
