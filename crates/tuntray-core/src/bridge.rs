//! Bridge process supervision
//!
//! The bridge (tun2socks) creates the TUN adapter and forwards its packets
//! to the upstream proxy. This module spawns it, drains its output into the
//! log, and kills it on demand.
//!
//! Key constraints:
//! - stdout and stderr are drained continuously so the child never blocks
//!   on a full pipe
//! - no console window is created on Windows
//! - a handle dropped without [`BridgeChild::terminate`] still kills the child

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::defaults::{DEFAULT_BRIDGE_LOG_LEVEL, DEFAULT_BRIDGE_PROGRAM};

/// How long terminate waits for the output drains to reach EOF
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Windows CREATE_NO_WINDOW flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Errors from the bridge process
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to start {program}: {cause}")]
    Spawn {
        program: String,
        #[source]
        cause: io::Error,
    },

    #[error("Failed to kill bridge process: {0}")]
    Terminate(#[source] io::Error),
}

/// Which pipe a drained line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamOrigin::Stdout => write!(f, "stdout"),
            StreamOrigin::Stderr => write!(f, "stderr"),
        }
    }
}

/// A running bridge owned by the session
#[async_trait]
pub trait BridgeChild: Send + Sync {
    /// OS process id, if the process is still known
    fn pid(&self) -> Option<u32>;

    /// Force-kill the process
    async fn terminate(&mut self) -> Result<(), BridgeError>;
}

/// Starts bridge processes
///
/// This trait lets the session work against the real tun2socks binary or a
/// test double.
#[async_trait]
pub trait BridgeLauncher: Send + Sync {
    /// Spawn a bridge bound to `adapter` forwarding through `proxy`
    async fn launch(&self, adapter: &str, proxy: &str) -> Result<Box<dyn BridgeChild>, BridgeError>;
}

/// Launcher for the tun2socks executable
#[derive(Debug, Clone)]
pub struct BridgeProcess {
    program: PathBuf,
    log_level: String,
}

impl BridgeProcess {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            log_level: DEFAULT_BRIDGE_LOG_LEVEL.to_string(),
        }
    }

    /// Builder method for the bridge verbosity
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Arguments binding the bridge to an adapter and proxy
    pub fn args(&self, adapter: &str, proxy: &str) -> Vec<String> {
        vec![
            "-device".to_string(),
            adapter.to_string(),
            "-proxy".to_string(),
            proxy.to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
        ]
    }

    /// Spawn the bridge and start draining its output
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, adapter: &str, proxy: &str) -> Result<RunningBridge, BridgeError> {
        let program = self.program.display().to_string();
        let args = self.args(adapter, proxy);
        info!("Starting bridge: {} {}", program, args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let mut child = command
            .spawn()
            .map_err(|cause| BridgeError::Spawn { program, cause })?;

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(tokio::spawn(drain_lines(stdout, StreamOrigin::Stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(tokio::spawn(drain_lines(stderr, StreamOrigin::Stderr)));
        }

        info!("Bridge started (pid {:?})", child.id());
        Ok(RunningBridge {
            child,
            drains,
            drained_lines: 0,
        })
    }
}

impl Default for BridgeProcess {
    fn default() -> Self {
        Self::new(PathBuf::from(".").join(DEFAULT_BRIDGE_PROGRAM))
    }
}

#[async_trait]
impl BridgeLauncher for BridgeProcess {
    async fn launch(&self, adapter: &str, proxy: &str) -> Result<Box<dyn BridgeChild>, BridgeError> {
        Ok(Box::new(self.spawn(adapter, proxy)?))
    }
}

/// Handle to a spawned tun2socks process
pub struct RunningBridge {
    child: Child,
    drains: Vec<JoinHandle<usize>>,
    drained_lines: usize,
}

#[async_trait]
impl BridgeChild for RunningBridge {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> Result<(), BridgeError> {
        let pid = self.child.id();
        self.child.kill().await.map_err(BridgeError::Terminate)?;

        // Pipes close with the process; a grandchild holding them open must not block stop.
        for drain in self.drains.drain(..) {
            match tokio::time::timeout(DRAIN_GRACE, drain).await {
                Ok(Ok(lines)) => self.drained_lines += lines,
                Ok(Err(e)) => warn!("Bridge drain task failed: {}", e),
                Err(_) => debug!("Bridge output still open after kill"),
            }
        }

        info!(
            "Bridge process {:?} killed ({} output lines)",
            pid, self.drained_lines
        );
        Ok(())
    }
}

/// Forward every line of a child pipe into the log until EOF
///
/// Lines are decoded lossily; bridge output in a non-UTF-8 code page must
/// not stop the drain. Returns the number of lines drained.
pub async fn drain_lines<R>(reader: R, origin: StreamOrigin) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("Bridge {} closed", origin);
                break;
            }
            Ok(_) => {
                count += 1;
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                info!(target: "tuntray::bridge", stream = %origin, "{}", line);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Error reading bridge {}: {}", origin, e);
                break;
            }
        }
    }

    count
}
