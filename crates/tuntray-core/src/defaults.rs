//! Default session values
//!
//! Fixed values the session uses unless the caller overrides them through
//! [`SessionSettings`](crate::session::SessionSettings).

use std::net::Ipv4Addr;
use std::time::Duration;

/// Name the bridge gives the TUN adapter it creates
pub const DEFAULT_ADAPTER_NAME: &str = "wintun";

/// Static address assigned to the adapter
pub const DEFAULT_ADAPTER_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 123, 1);

/// Netmask assigned with the adapter address
pub const DEFAULT_ADAPTER_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// DNS server pinned on the adapter while a session runs
pub const DEFAULT_DNS_SERVER: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// Metric of the default route pointed at the adapter
pub const DEFAULT_ROUTE_METRIC: u32 = 1;

/// How long Start waits for the adapter to show up
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(20);

/// Interface enumeration cadence while waiting for the adapter
pub const ADAPTER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Bridge program looked up in the working directory
#[cfg(windows)]
pub const DEFAULT_BRIDGE_PROGRAM: &str = "tun2socks.exe";
#[cfg(not(windows))]
pub const DEFAULT_BRIDGE_PROGRAM: &str = "tun2socks";

/// Verbosity passed to the bridge
pub const DEFAULT_BRIDGE_LOG_LEVEL: &str = "info";

/// Driver library the bridge loads from its working directory
pub const SUPPORT_FILE_NAME: &str = "wintun.dll";

/// Directory holding per-architecture copies of the support file
pub const SUPPORT_SOURCE_DIR: &str = "wintun";

/// Proxy used when no configuration can be loaded at all
pub const DEFAULT_PROXY: &str = "socks5://127.0.0.1:7890";

/// Current configuration file name
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Pre-migration proxy list file name
pub const LEGACY_PROXIES_FILE_NAME: &str = "proxies.json";
