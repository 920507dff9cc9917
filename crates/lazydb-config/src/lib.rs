//! Runtime configuration for LazyDB.
//!
//! Settings are read from a TOML document. Every key is optional; missing
//! keys fall back to the defaults documented on [`RuntimeConfig`].

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

///
/// ValidationMode
///
/// Auto     : run the pre-write validation hook
/// Callback : same as `Auto`
/// None     : never validate before writes
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    #[default]
    #[display("auto")]
    Auto,
    #[display("callback")]
    Callback,
    #[display("none")]
    None,
}

impl ValidationMode {
    #[must_use]
    pub const fn validates(self) -> bool {
        matches!(self, Self::Auto | Self::Callback)
    }
}

///
/// RuntimeConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Whether the pre-insert / pre-update hook validates entities.
    pub validation_mode: ValidationMode,

    /// Echo every executed statement into the metrics sink.
    pub show_sql: bool,

    /// Honour lazily-fetched attributes. When disabled every attribute is
    /// fetched with its row.
    pub lazy_loading: bool,

    /// Fetch lazy collection attributes together with the row.
    pub collections_in_default_fetch_group: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            validation_mode: ValidationMode::Auto,
            show_sql: false,
            lazy_loading: true,
            collections_in_default_fetch_group: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&text)
    }

    #[must_use]
    pub const fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    #[must_use]
    pub const fn with_lazy_loading(mut self, lazy_loading: bool) -> Self {
        self.lazy_loading = lazy_loading;
        self
    }

    #[must_use]
    pub const fn with_collections_in_default_fetch_group(mut self, eager: bool) -> Self {
        self.collections_in_default_fetch_group = eager;
        self
    }
}

///
/// TESTS
///
