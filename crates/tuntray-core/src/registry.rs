//! Proxy registry
//!
//! The ordered, deduplicated list of known upstream proxies plus the
//! current selection. The registry itself is pure data; persistence is
//! driven by the session controller after every mutation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config_store::AppConfig;

/// Errors from registry mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Proxy address cannot be empty")]
    EmptyAddress,

    #[error("Proxy already exists: {0}")]
    DuplicateAddress(String),

    #[error("Unknown proxy: {0}")]
    UnknownAddress(String),
}

/// Known proxies in display order plus the selected one
///
/// Invariants:
/// - `entries` holds no duplicates
/// - `selected` is one of `entries`, or empty iff `entries` is empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRegistry {
    entries: Vec<String>,
    selected: String,
}

impl ProxyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from loaded entries and a preferred selection
    ///
    /// Duplicates and blank entries are dropped. A preferred selection that
    /// is not among the entries falls back to the first entry.
    pub fn from_parts(entries: Vec<String>, preferred: &str) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            let entry = entry.trim();
            if !entry.is_empty() && !registry.contains(entry) {
                registry.entries.push(entry.to_string());
            }
        }

        registry.selected = if registry.contains(preferred) {
            preferred.to_string()
        } else {
            registry.entries.first().cloned().unwrap_or_default()
        };
        registry
    }

    /// Build a registry from the persisted configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_parts(config.proxies.clone(), &config.last_selected_proxy)
    }

    /// Write entries and selection into a configuration, keeping its other fields
    pub fn write_to(&self, config: &mut AppConfig) {
        config.proxies = self.entries.clone();
        config.last_selected_proxy = self.selected.clone();
    }

    /// Entries in display order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Selected proxy, empty when the registry is empty
    pub fn selected(&self) -> &str {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.iter().any(|e| e == address)
    }

    /// Append a proxy, returning the trimmed address that was stored
    ///
    /// The first entry added to an empty registry becomes the selection.
    pub fn add(&mut self, address: &str) -> Result<String, RegistryError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(RegistryError::EmptyAddress);
        }
        if self.contains(address) {
            return Err(RegistryError::DuplicateAddress(address.to_string()));
        }

        self.entries.push(address.to_string());
        if self.selected.is_empty() {
            self.selected = address.to_string();
        }
        Ok(address.to_string())
    }

    /// Remove a proxy; returns false when it was not registered
    ///
    /// Removing the selected proxy moves the selection to the first
    /// remaining entry, or clears it.
    pub fn delete(&mut self, address: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e != address);
        if self.entries.len() == before {
            return false;
        }

        if self.selected == address {
            self.selected = self.entries.first().cloned().unwrap_or_default();
        }
        true
    }

    /// Change the selection; returns false when it was already selected
    pub fn select(&mut self, address: &str) -> Result<bool, RegistryError> {
        if !self.contains(address) {
            return Err(RegistryError::UnknownAddress(address.to_string()));
        }
        if self.selected == address {
            return Ok(false);
        }
        self.selected = address.to_string();
        Ok(true)
    }
}
