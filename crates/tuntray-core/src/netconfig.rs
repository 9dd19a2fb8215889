//! Adapter network configuration
//!
//! Applies and reverts the three settings a session needs on the TUN
//! adapter: a static IPv4 address, a static DNS server and a default route
//! through the adapter.
//!
//! Apply is fail-fast: a half-applied default route can cut the host off
//! the network, so every failure is reported. The only retry is for the
//! route step, which conflicts with a stale route left by an unclean
//! shutdown. Revert never fails; it also runs from the exit handler where
//! nobody is left to retry.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::defaults::{
    DEFAULT_ADAPTER_ADDRESS, DEFAULT_ADAPTER_MASK, DEFAULT_ADAPTER_NAME, DEFAULT_DNS_SERVER,
    DEFAULT_ROUTE_METRIC,
};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Errors from applying adapter settings
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Command `{command}` failed ({cause}): {output}")]
    CommandFailed {
        command: String,
        output: String,
        cause: String,
    },
}

/// Settings applied to the adapter while a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    pub name: String,
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub dns: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub route_metric: u32,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_ADAPTER_NAME.to_string(),
            address: DEFAULT_ADAPTER_ADDRESS,
            mask: DEFAULT_ADAPTER_MASK,
            dns: DEFAULT_DNS_SERVER,
            gateway: DEFAULT_ADAPTER_ADDRESS,
            route_metric: DEFAULT_ROUTE_METRIC,
        }
    }
}

impl AdapterSettings {
    /// Settings for a differently named adapter, other values default
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Prefix length of the netmask
    pub fn prefix_len(&self) -> u32 {
        u32::from(self.mask).count_ones()
    }
}

/// One OS-level network effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCommand {
    SetStaticAddress {
        adapter: String,
        address: Ipv4Addr,
        mask: Ipv4Addr,
    },
    SetStaticDns {
        adapter: String,
        dns: Ipv4Addr,
    },
    AddDefaultRoute {
        adapter: String,
        gateway: Ipv4Addr,
        metric: u32,
    },
    DeleteDefaultRoute {
        adapter: String,
    },
    SetDnsDhcp {
        adapter: String,
    },
    SetAddressDhcp {
        adapter: String,
    },
    /// Drop cached network-profile registrations whose name matches `pattern`
    RemoveNetworkProfiles {
        pattern: String,
    },
}

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl NetCommand {
    /// Platform invocation for this effect, `None` when the platform has no equivalent
    #[cfg(windows)]
    pub fn command_line(&self) -> Option<CommandLine> {
        let line = match self {
            NetCommand::SetStaticAddress {
                adapter,
                address,
                mask,
            } => CommandLine::new(
                "netsh",
                &[
                    "interface",
                    "ipv4",
                    "set",
                    "address",
                    &format!("name={adapter}"),
                    "source=static",
                    &format!("addr={address}"),
                    &format!("mask={mask}"),
                ],
            ),
            NetCommand::SetStaticDns { adapter, dns } => CommandLine::new(
                "netsh",
                &[
                    "interface",
                    "ipv4",
                    "set",
                    "dnsservers",
                    &format!("name={adapter}"),
                    "static",
                    &format!("address={dns}"),
                    "register=none",
                    "validate=no",
                ],
            ),
            NetCommand::AddDefaultRoute {
                adapter,
                gateway,
                metric,
            } => CommandLine::new(
                "netsh",
                &[
                    "interface",
                    "ipv4",
                    "add",
                    "route",
                    "0.0.0.0/0",
                    adapter,
                    &gateway.to_string(),
                    &format!("metric={metric}"),
                ],
            ),
            NetCommand::DeleteDefaultRoute { adapter } => CommandLine::new(
                "netsh",
                &["interface", "ipv4", "delete", "route", "0.0.0.0/0", adapter],
            ),
            NetCommand::SetDnsDhcp { adapter } => CommandLine::new(
                "netsh",
                &[
                    "interface",
                    "ipv4",
                    "set",
                    "dnsservers",
                    &format!("name={adapter}"),
                    "source=dhcp",
                ],
            ),
            NetCommand::SetAddressDhcp { adapter } => CommandLine::new(
                "netsh",
                &[
                    "interface",
                    "ipv4",
                    "set",
                    "address",
                    &format!("name={adapter}"),
                    "source=dhcp",
                ],
            ),
            NetCommand::RemoveNetworkProfiles { pattern } => {
                let script = format!(
                    "$profilesPath = 'HKLM:\\SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\NetworkList\\Profiles'; \
                     if (Test-Path $profilesPath) {{ Get-ChildItem $profilesPath | ForEach-Object {{ \
                     try {{ $profile = Get-ItemProperty $_.PsPath; \
                     if ($profile.ProfileName -like '{pattern}') {{ Remove-Item $_.PsPath -Recurse -Force }} }} catch {{}} }} }}"
                );
                CommandLine::new("powershell", &["-NoProfile", "-Command", &script])
            }
        };
        Some(line)
    }

    /// Platform invocation for this effect, `None` when the platform has no equivalent
    #[cfg(not(windows))]
    pub fn command_line(&self) -> Option<CommandLine> {
        let line = match self {
            NetCommand::SetStaticAddress {
                adapter,
                address,
                mask,
            } => {
                let prefix = u32::from(*mask).count_ones();
                CommandLine::new(
                    "ip",
                    &["addr", "replace", &format!("{address}/{prefix}"), "dev", adapter],
                )
            }
            NetCommand::SetStaticDns { adapter, dns } => {
                CommandLine::new("resolvectl", &["dns", adapter, &dns.to_string()])
            }
            NetCommand::AddDefaultRoute {
                adapter,
                gateway,
                metric,
            } => CommandLine::new(
                "ip",
                &[
                    "route",
                    "add",
                    "default",
                    "via",
                    &gateway.to_string(),
                    "dev",
                    adapter,
                    "metric",
                    &metric.to_string(),
                    "onlink",
                ],
            ),
            NetCommand::DeleteDefaultRoute { adapter } => {
                CommandLine::new("ip", &["route", "del", "default", "dev", adapter])
            }
            NetCommand::SetDnsDhcp { adapter } => {
                CommandLine::new("resolvectl", &["revert", adapter])
            }
            NetCommand::SetAddressDhcp { adapter } => {
                CommandLine::new("ip", &["addr", "flush", "dev", adapter])
            }
            NetCommand::RemoveNetworkProfiles { .. } => return None,
        };
        Some(line)
    }

    fn effect(&self) -> &'static str {
        match self {
            NetCommand::SetStaticAddress { .. } => "set-static-address",
            NetCommand::SetStaticDns { .. } => "set-static-dns",
            NetCommand::AddDefaultRoute { .. } => "add-default-route",
            NetCommand::DeleteDefaultRoute { .. } => "delete-default-route",
            NetCommand::SetDnsDhcp { .. } => "set-dns-dhcp",
            NetCommand::SetAddressDhcp { .. } => "set-address-dhcp",
            NetCommand::RemoveNetworkProfiles { .. } => "remove-network-profiles",
        }
    }
}

impl fmt::Display for NetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command_line() {
            Some(line) => write!(f, "{line}"),
            None => write!(f, "{} (not supported on this platform)", self.effect()),
        }
    }
}

/// Result of running one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit status description
    pub status: String,
    /// Combined stdout and stderr
    pub output: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            output: String::new(),
        }
    }
}

/// Executes network commands
///
/// The seam between configuration policy and the host; tests substitute a
/// scripted runner.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &NetCommand) -> io::Result<CommandOutput>;
}

/// Runs commands on the host without a console window
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &NetCommand) -> io::Result<CommandOutput> {
        let Some(line) = command.command_line() else {
            debug!("Skipping {}", command);
            return Ok(CommandOutput::ok());
        };

        debug!("Running: {}", line);
        let mut cmd = Command::new(&line.program);
        cmd.args(&line.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let out = cmd.output().await?;
        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(CommandOutput {
            success: out.status.success(),
            status: out.status.to_string(),
            output: output.trim().to_string(),
        })
    }
}

/// Applies and reverts adapter settings through a [`CommandRunner`]
#[derive(Clone)]
pub struct NetworkConfigurator {
    runner: Arc<dyn CommandRunner>,
}

impl NetworkConfigurator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Configurator that runs real host commands
    pub fn system() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }

    /// Apply address, DNS and default route, in that order
    ///
    /// A failed route add is followed by one delete of the same route and a
    /// single retry. Address and DNS failures are returned immediately.
    pub async fn apply(&self, settings: &AdapterSettings) -> Result<(), ConfigError> {
        let adapter = settings.name.clone();
        info!(
            "Configuring adapter {}: {}/{} dns {} via {}",
            adapter,
            settings.address,
            settings.prefix_len(),
            settings.dns,
            settings.gateway
        );

        self.run_checked(&NetCommand::SetStaticAddress {
            adapter: adapter.clone(),
            address: settings.address,
            mask: settings.mask,
        })
        .await?;

        self.run_checked(&NetCommand::SetStaticDns {
            adapter: adapter.clone(),
            dns: settings.dns,
        })
        .await?;

        let add_route = NetCommand::AddDefaultRoute {
            adapter: adapter.clone(),
            gateway: settings.gateway,
            metric: settings.route_metric,
        };
        if let Err(first) = self.run_checked(&add_route).await {
            warn!("Default route add failed, clearing stale route and retrying: {}", first);
            let delete_route = NetCommand::DeleteDefaultRoute { adapter };
            if let Err(e) = self.run_checked(&delete_route).await {
                debug!("Stale route delete failed: {}", e);
            }
            self.run_checked(&add_route).await?;
        }

        info!("Adapter {} configured", settings.name);
        Ok(())
    }

    /// Undo everything [`apply`](Self::apply) does, ignoring failures
    ///
    /// Every step is attempted. Returns how many steps failed.
    pub async fn revert(&self, adapter: &str) -> usize {
        let steps = [
            NetCommand::DeleteDefaultRoute {
                adapter: adapter.to_string(),
            },
            NetCommand::SetDnsDhcp {
                adapter: adapter.to_string(),
            },
            NetCommand::SetAddressDhcp {
                adapter: adapter.to_string(),
            },
            NetCommand::RemoveNetworkProfiles {
                pattern: format!("{adapter}*"),
            },
        ];

        let mut failed = 0;
        for step in &steps {
            if let Err(e) = self.run_checked(step).await {
                warn!("Cleanup step failed (ignored): {}", e);
                failed += 1;
            }
        }

        info!(
            "Adapter {} reverted ({} of {} cleanup steps failed)",
            adapter,
            failed,
            steps.len()
        );
        failed
    }

    async fn run_checked(&self, command: &NetCommand) -> Result<(), ConfigError> {
        match self.runner.run(command).await {
            Ok(out) if out.success => {
                debug!("OK: {}", command);
                Ok(())
            }
            Ok(out) => {
                let err = ConfigError::CommandFailed {
                    command: command.to_string(),
                    output: out.output,
                    cause: out.status,
                };
                error!("{}", err);
                Err(err)
            }
            Err(e) => {
                let err = ConfigError::CommandFailed {
                    command: command.to_string(),
                    output: String::new(),
                    cause: e.to_string(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }
}
