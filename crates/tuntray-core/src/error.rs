//! Session error types
//!
//! Every component has its own narrow error enum; [`SessionError`] is the
//! single type returned by the controller and carries the underlying cause
//! through `#[source]` so diagnostic chains survive up to the caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::adapter::WatchError;
use crate::bridge::BridgeError;
use crate::netconfig::ConfigError;
use crate::registry::RegistryError;

/// Errors returned by [`SessionController`](crate::session::SessionController)
#[derive(Debug, Error)]
pub enum SessionError {
    /// Start was requested without a proxy
    #[error("No proxy selected")]
    NoProxySelected,

    /// Start or switch named a proxy the registry does not know
    #[error("Unknown proxy: {0}")]
    UnknownProxy(String),

    /// A session is already active
    #[error("Session is already running")]
    AlreadyRunning,

    /// The bridge support file is absent from both locations
    #[error("Bridge support file {} not found (fallback {}): {cause}", .target.display(), .source_path.display())]
    DependencyMissing {
        target: PathBuf,
        source_path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// The bridge process could not be spawned
    #[error("Failed to start bridge {program}: {cause}")]
    SpawnError {
        program: String,
        #[source]
        cause: std::io::Error,
    },

    /// The adapter never appeared
    #[error("Adapter {adapter} did not appear within {}s", .waited.as_secs())]
    AdapterTimeout { adapter: String, waited: Duration },

    /// Interface enumeration failed while waiting for the adapter
    #[error("Failed to enumerate network interfaces: {0}")]
    EnumerationFailed(#[source] std::io::Error),

    /// Applying adapter settings failed
    #[error("Network configuration failed: {0}")]
    NetworkConfigFailed(#[from] ConfigError),

    /// The bridge process could not be killed
    #[error("Failed to stop bridge: {0}")]
    TerminateFailed(#[source] std::io::Error),

    /// A blank proxy address was added
    #[error("Proxy address cannot be empty")]
    EmptyAddress,

    /// The proxy address is already registered
    #[error("Proxy already exists: {0}")]
    DuplicateAddress(String),

    /// The dispatcher loop has exited
    #[error("Session dispatcher is not running")]
    DispatcherClosed,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<WatchError> for SessionError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::Timeout { adapter, waited } => Self::AdapterTimeout { adapter, waited },
            WatchError::EnumerationFailed(cause) => Self::EnumerationFailed(cause),
        }
    }
}

impl From<BridgeError> for SessionError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Spawn { program, cause } => Self::SpawnError { program, cause },
            BridgeError::Terminate(cause) => Self::TerminateFailed(cause),
        }
    }
}

impl From<RegistryError> for SessionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::EmptyAddress => Self::EmptyAddress,
            RegistryError::DuplicateAddress(address) => Self::DuplicateAddress(address),
            RegistryError::UnknownAddress(address) => Self::UnknownProxy(address),
        }
    }
}
