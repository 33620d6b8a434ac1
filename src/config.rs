//! Configuration loading
//!
//! Looked up at, in order: an explicit path, `$COLGRAPH_CONFIG`, then
//! `~/.config/colgraph/config.toml`. A missing file means defaults.
//!
//! ```toml
//! [store]
//! read_from_cache = true
//! cache_capacity = 1024
//! pin_on_write = false
//!
//! [store.backend]
//! type = "file"
//! path = "graph.col"
//!
//! [graph]
//! history = true
//! ```

use crate::store::{FileStore, MemoryStore, Store, StoreOptions, DEFAULT_CACHE_CAPACITY};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "COLGRAPH_CONFIG";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub graph: GraphConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub read_from_cache: bool,
    pub cache_capacity: usize,
    pub pin_on_write: bool,
    pub backend: BackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            read_from_cache: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            pin_on_write: false,
            backend: BackendConfig::Memory,
        }
    }
}

/// Where blocks live
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory,
    File {
        path: PathBuf,
    },
    Http {
        /// Retrieval URL template, e.g. `https://gateway.example/ipfs/{address}`
        source_url: String,
        /// Submission URL template
        put_url: String,
        #[serde(default)]
        pin_url: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Link each rewritten node to the version it replaced (`{name}_last`)
    pub history: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig { history: true }
    }
}

impl Config {
    /// The default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("colgraph").join("config.toml"))
    }

    /// Resolve the config path and load it
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load a specific file; unlike [`Config::load`] a missing file is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

impl StoreConfig {
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            read_from_cache: self.read_from_cache,
            pin_on_write: self.pin_on_write,
            cache_capacity: self.cache_capacity,
        }
    }

    /// Construct the backend and wrap it in a cached [`Store`]
    pub fn open(&self) -> Result<Store> {
        let options = self.options();
        let store = match &self.backend {
            BackendConfig::Memory => Store::new(Arc::new(MemoryStore::new()), options),
            BackendConfig::File { path } => {
                Store::new(Arc::new(FileStore::open_or_create(path)?), options)
            }
            #[cfg(feature = "http")]
            BackendConfig::Http {
                source_url,
                put_url,
                pin_url,
                timeout_secs,
            } => {
                use crate::store::{HttpStore, UrlTemplate};

                let mut http = HttpStore::new(
                    Arc::new(UrlTemplate::new(source_url.clone())),
                    Arc::new(UrlTemplate::new(put_url.clone())),
                    std::time::Duration::from_secs(*timeout_secs),
                )?;
                if let Some(pin_url) = pin_url {
                    http = http.with_pin(Arc::new(UrlTemplate::new(pin_url.clone())));
                }
                Store::new(Arc::new(http), options)
            }
            #[cfg(not(feature = "http"))]
            BackendConfig::Http { .. } => {
                return Err(Error::Config(
                    "http backend requires the `http` feature".into(),
                ))
            }
        };
        Ok(store)
    }
}
