//! Adapter discovery
//!
//! The bridge creates the TUN adapter as a side effect of starting, and it
//! takes a moment for the OS to enumerate it. [`AdapterWatcher`] polls the
//! interface list until the adapter shows up or the deadline passes.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::defaults::ADAPTER_POLL_INTERVAL;

/// Errors from waiting on an adapter
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Adapter {adapter} did not appear within {}s", .waited.as_secs())]
    Timeout { adapter: String, waited: Duration },

    #[error("Failed to enumerate network interfaces: {0}")]
    EnumerationFailed(#[source] io::Error),
}

/// Source of host interface names
pub trait InterfaceSource: Send + Sync {
    /// Names by which each current interface can be addressed
    fn interface_names(&self) -> io::Result<Vec<String>>;
}

/// Host interfaces as reported by the OS
///
/// On Windows an adapter is listed under both its interface name and its
/// friendly name, since netsh addresses adapters by the latter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interface_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for iface in default_net::get_interfaces() {
            if let Some(friendly) = iface.friendly_name {
                names.push(friendly);
            }
            names.push(iface.name);
        }
        Ok(names)
    }
}

/// Polls an [`InterfaceSource`] for a named adapter
#[derive(Clone)]
pub struct AdapterWatcher {
    source: Arc<dyn InterfaceSource>,
    poll_interval: Duration,
}

impl AdapterWatcher {
    /// Create a watcher with the standard 500ms cadence
    pub fn new(source: Arc<dyn InterfaceSource>) -> Self {
        Self::with_poll_interval(source, ADAPTER_POLL_INTERVAL)
    }

    pub fn with_poll_interval(source: Arc<dyn InterfaceSource>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
        }
    }

    /// Watcher over the host's real interfaces
    pub fn system() -> Self {
        Self::new(Arc::new(SystemInterfaces))
    }

    /// Wait until `name` is enumerable or `timeout` elapses
    ///
    /// The last poll happens at the deadline, so a timeout is reported no
    /// earlier than `timeout` and no later than one poll interval after it.
    /// An enumeration error ends the wait immediately.
    pub async fn wait_for_adapter(&self, name: &str, timeout: Duration) -> Result<(), WatchError> {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            let names = self
                .source
                .interface_names()
                .map_err(WatchError::EnumerationFailed)?;

            if names.iter().any(|n| n == name) {
                info!("Adapter {} found after {:?}", name, started.elapsed());
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WatchError::Timeout {
                    adapter: name.to_string(),
                    waited: now - started,
                });
            }

            debug!("Adapter {} not present yet", name);
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
