//! tuntray Core Library
//!
//! Lifecycle management for a TUN session: a tun2socks bridge process
//! creates the adapter, the adapter is configured to carry the host's
//! default route, and everything is torn down again on stop or exit.
//! This crate has no front-end of its own; the CLI (or any other shell)
//! drives it through the [`dispatcher`].
//!
//! # Modules
//!
//! - [`session`] - Session controller and state machine
//! - [`dispatcher`] - Command loop serializing front-end requests
//! - [`bridge`] - tun2socks process supervision
//! - [`adapter`] - Waiting for the TUN adapter to appear
//! - [`netconfig`] - Applying and reverting adapter address, DNS and route
//! - [`registry`] - Known proxies and the current selection
//! - [`config_store`] - Persisted preferences and legacy migration
//! - [`support`] - Driver library placement next to the bridge
//! - [`events`] - Event sink trait for decoupling from front-ends
//! - [`defaults`] - Default session values
//! - [`error`] - Error types

pub mod adapter;
pub mod bridge;
pub mod config_store;
pub mod defaults;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod netconfig;
pub mod registry;
pub mod session;
pub mod support;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use adapter::{AdapterWatcher, InterfaceSource, SystemInterfaces, WatchError};
pub use bridge::{BridgeChild, BridgeError, BridgeLauncher, BridgeProcess};
pub use config_store::{AppConfig, ConfigSource, ConfigStore, JsonFileStore, StoreError};
pub use dispatcher::{Dispatcher, DispatcherHandle, SessionCommand};
pub use error::{Result, SessionError};
pub use events::{NoOpEventSink, SessionEventSink, StdoutEventSink};
pub use netconfig::{
    AdapterSettings, CommandRunner, ConfigError, NetCommand, NetworkConfigurator,
    SystemCommandRunner,
};
pub use registry::{ProxyRegistry, RegistryError};
pub use session::{SessionController, SessionSettings, SessionState, SessionStatus};
pub use support::SupportFile;
