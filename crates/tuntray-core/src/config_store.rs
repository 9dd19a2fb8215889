//! Persisted session preferences
//!
//! The on-disk format is a small JSON document:
//!
//! ```json
//! { "proxies": ["socks5://127.0.0.1:7890"], "last_selected_proxy": "socks5://127.0.0.1:7890" }
//! ```
//!
//! Older installs kept a flat JSON array of proxies in a separate file.
//! [`load_registry`] accepts that legacy source once, rewrites it in the
//! current format and removes it.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::defaults::{CONFIG_FILE_NAME, DEFAULT_PROXY, LEGACY_PROXIES_FILE_NAME};
use crate::registry::ProxyRegistry;

/// Errors raised by a [`ConfigStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {}: {cause}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted configuration document
///
/// Fields the session does not own (the tray's language choice, for one)
/// are kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub proxies: Vec<String>,

    #[serde(default)]
    pub last_selected_proxy: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// What a store found when asked to load
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// A valid current-format document
    Current(AppConfig),
    /// No valid current document, but a legacy proxy list
    Legacy(Vec<String>),
    /// Nothing usable
    Missing,
}

/// Storage backend for [`AppConfig`]
pub trait ConfigStore: Send + Sync {
    /// Read whatever configuration source is available
    fn load(&self) -> ConfigSource;

    /// Write the current-format document
    fn save(&self, config: &AppConfig) -> Result<(), StoreError>;

    /// Delete the legacy source after a successful migration
    fn remove_legacy(&self) -> Result<(), StoreError>;
}

/// Load the registry and the full document from a store
///
/// Applies the migration contract: a legacy list is adopted with its first
/// entry selected and rewritten once; with no source at all the built-in
/// default proxy is used. Persistence failures during migration are logged
/// and do not prevent startup.
pub fn load_registry(store: &dyn ConfigStore) -> (ProxyRegistry, AppConfig) {
    match store.load() {
        ConfigSource::Current(config) => {
            info!("Configuration loaded ({} proxies)", config.proxies.len());
            (ProxyRegistry::from_config(&config), config)
        }
        ConfigSource::Legacy(proxies) => {
            info!("Migrating {} proxies from legacy list", proxies.len());
            let selected = proxies.first().cloned().unwrap_or_default();
            let registry = ProxyRegistry::from_parts(proxies, &selected);
            let mut config = AppConfig::default();
            registry.write_to(&mut config);

            match store.save(&config) {
                Ok(()) => {
                    if let Err(e) = store.remove_legacy() {
                        warn!("Failed to remove legacy proxy list: {}", e);
                    }
                    info!("Legacy proxy list migrated");
                }
                Err(e) => warn!("Failed to write migrated configuration: {}", e),
            }
            (registry, config)
        }
        ConfigSource::Missing => {
            info!("No valid configuration found, using default proxy {}", DEFAULT_PROXY);
            let registry = ProxyRegistry::from_parts(vec![DEFAULT_PROXY.to_string()], DEFAULT_PROXY);
            let mut config = AppConfig::default();
            registry.write_to(&mut config);
            if let Err(e) = store.save(&config) {
                warn!("Failed to write default configuration: {}", e);
            }
            (registry, config)
        }
    }
}

/// JSON file store: `config.json` plus the legacy `proxies.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    config_path: PathBuf,
    legacy_path: PathBuf,
}

impl JsonFileStore {
    /// Create a store with explicit file paths
    pub fn new(config_path: PathBuf, legacy_path: PathBuf) -> Self {
        Self {
            config_path,
            legacy_path,
        }
    }

    /// Create a store using the standard file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILE_NAME), dir.join(LEGACY_PROXIES_FILE_NAME))
    }

    /// Default configuration directory
    pub fn default_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("tuntray");
        path
    }

    fn load_current(&self) -> Option<AppConfig> {
        let data = std::fs::read(&self.config_path).ok()?;
        match serde_json::from_slice::<AppConfig>(&data) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(
                    "Failed to parse {}: {}",
                    self.config_path.display(),
                    e
                );
                None
            }
        }
    }

    fn load_legacy(&self) -> Option<Vec<String>> {
        let data = std::fs::read(&self.legacy_path).ok()?;
        match serde_json::from_slice::<Vec<String>>(&data) {
            Ok(proxies) if !proxies.is_empty() => Some(proxies),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    "Failed to parse legacy list {}: {}",
                    self.legacy_path.display(),
                    e
                );
                None
            }
        }
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> ConfigSource {
        if let Some(config) = self.load_current() {
            return ConfigSource::Current(config);
        }
        match self.load_legacy() {
            Some(proxies) => ConfigSource::Legacy(proxies),
            None => ConfigSource::Missing,
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), StoreError> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|cause| StoreError::Io {
                    path: parent.to_path_buf(),
                    cause,
                })?;
            }
        }

        let data = serde_json::to_vec_pretty(config)?;
        std::fs::write(&self.config_path, data).map_err(|cause| StoreError::Io {
            path: self.config_path.clone(),
            cause,
        })
    }

    fn remove_legacy(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.legacy_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(cause) => Err(StoreError::Io {
                path: self.legacy_path.clone(),
                cause,
            }),
        }
    }
}
