//! Store configuration.
//!
//! ```json
//! {
//!     "uri": "mongodb://localhost:27017",
//!     "database": "media",
//!     "collection": "downloads",
//!     "indexes": "status;created_at:desc"
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{StoreError, StoreResult},
    query::DEFAULT_LIMIT,
};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 120;

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Where a store lives and how it starts up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection string of the database server.
    pub uri: String,
    pub database: String,
    pub collection: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Limit new query builders start with. Zero or negative means unbounded.
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    /// Index descriptor applied when the store is opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<String>,
}

impl StoreConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            collection: collection.into(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            default_limit: DEFAULT_LIMIT,
            indexes: None,
        }
    }

    pub fn with_indexes(mut self, descriptor: impl Into<String>) -> Self {
        self.indexes = Some(descriptor.into());
        self
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] on malformed JSON or empty required fields.
    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StoreError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that `uri`, `database` and `collection` are non-empty.
    pub fn validate(&self) -> StoreResult<()> {
        for (name, value) in [
            ("uri", &self.uri),
            ("database", &self.database),
            ("collection", &self.collection),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::Configuration(format!("`{name}` must not be empty")));
            }
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
