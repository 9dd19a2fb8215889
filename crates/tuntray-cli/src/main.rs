//! tuntray CLI
//!
//! Command-line front-end for the tuntray session manager. `tuntray run`
//! supervises a tun2socks bridge and routes the host through it until the
//! console is closed; `tuntray proxy` edits the saved proxy list.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use tuntray_core::defaults::{
    DEFAULT_ADAPTER_NAME, DEFAULT_ADAPTER_TIMEOUT, DEFAULT_BRIDGE_PROGRAM, SUPPORT_FILE_NAME,
};
use tuntray_core::dispatcher::{self, DEFAULT_QUEUE_DEPTH};
use tuntray_core::{
    AdapterSettings, AdapterWatcher, BridgeProcess, ConfigStore, JsonFileStore,
    NetworkConfigurator, NoOpEventSink, SessionController, SessionSettings, StdoutEventSink,
    SupportFile,
};

mod console;
mod privilege;

/// tuntray - route the whole host through a proxy via a TUN adapter
#[derive(Parser, Debug)]
#[command(name = "tuntray")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding config.json
    #[arg(long, env = "TUNTRAY_CONFIG_DIR")]
    config_dir: Option<String>,

    /// Also append logs to this file
    #[arg(long, env = "TUNTRAY_LOG_FILE")]
    log_file: Option<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the session console
    Run(RunArgs),

    /// Manage saved proxies
    Proxy {
        #[command(subcommand)]
        action: ProxyAction,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Adapter name the bridge creates
    #[arg(long, env = "TUNTRAY_ADAPTER", default_value = DEFAULT_ADAPTER_NAME)]
    adapter: String,

    /// Path to the tun2socks executable
    #[arg(long, env = "TUNTRAY_BRIDGE")]
    bridge: Option<String>,

    /// Directory with per-architecture copies of wintun.dll
    #[arg(long, env = "TUNTRAY_SUPPORT_DIR")]
    support_dir: Option<String>,

    /// Seconds to wait for the adapter to appear
    #[arg(long, env = "TUNTRAY_ADAPTER_TIMEOUT", default_value_t = DEFAULT_ADAPTER_TIMEOUT.as_secs())]
    adapter_timeout: u64,

    /// Start through the selected proxy right away
    #[arg(long)]
    start: bool,

    /// Do not refuse to run without administrator rights
    #[arg(long)]
    skip_privilege_check: bool,
}

#[derive(Subcommand, Debug)]
enum ProxyAction {
    /// List saved proxies
    List,
    /// Save a new proxy
    Add { address: String },
    /// Remove a saved proxy
    Delete { address: String },
    /// Select the proxy used by the next start
    Select { address: String },
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match init_logging(args.log_file.as_deref().map(expand_path).as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config_dir = args
        .config_dir
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(JsonFileStore::default_dir);
    let store: Arc<dyn ConfigStore> = Arc::new(JsonFileStore::in_dir(&config_dir));
    let json_output = matches!(args.format, OutputFormat::Json);

    match args.command {
        Command::Run(run_args) => run(run_args, store, json_output).await,
        Command::Proxy { action } => proxy(action, store, json_output).await,
    }
}

/// Initialize tracing: stderr always, plus an append-only file when requested
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| format!("Invalid log file path: {}", path.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(name.to_string_lossy())
                .build(dir)
                .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn run(args: RunArgs, store: Arc<dyn ConfigStore>, json_output: bool) -> ExitCode {
    if !args.skip_privilege_check && !privilege::is_elevated() {
        eprintln!("Error: changing routes requires administrator rights");
        eprintln!("{}", privilege::elevation_hint());
        return ExitCode::FAILURE;
    }

    // Installed before the initial start so an early signal is not lost
    let shutdown = match watch_shutdown() {
        Ok(rx) => rx,
        Err(e) => {
            eprintln!("Error: failed to install signal handlers: {e}");
            return ExitCode::FAILURE;
        }
    };

    let support_file = match args.support_dir.as_deref() {
        Some(dir) => Some(SupportFile::new(
            PathBuf::from(".").join(SUPPORT_FILE_NAME),
            expand_path(dir),
        )),
        None => SupportFile::platform_default(),
    };
    let settings = SessionSettings {
        adapter: AdapterSettings::named(args.adapter.as_str()),
        adapter_timeout: Duration::from_secs(args.adapter_timeout),
        support_file,
    };

    let bridge = BridgeProcess::new(resolve_bridge(args.bridge.as_deref()));
    tracing::info!(
        "Using bridge {} for adapter {}",
        bridge.program().display(),
        settings.adapter.name
    );

    let controller = Arc::new(SessionController::new(
        settings,
        store,
        Arc::new(bridge),
        AdapterWatcher::system(),
        NetworkConfigurator::system(),
        Arc::new(StdoutEventSink::new(json_output)),
    ));

    let (handle, dispatcher) = dispatcher::channel(controller, DEFAULT_QUEUE_DEPTH);
    let dispatcher_task = tokio::spawn(dispatcher.run());

    if args.start {
        if let Err(e) = handle.start(None).await {
            tracing::debug!("Initial start failed: {}", e);
        }
    }

    console::run_console(&handle, json_output, shutdown_requested(shutdown)).await;

    let result = handle.shutdown().await;
    drop(handle);
    if let Err(e) = dispatcher_task.await {
        tracing::error!("Dispatcher task failed: {}", e);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn proxy(action: ProxyAction, store: Arc<dyn ConfigStore>, json_output: bool) -> ExitCode {
    let controller = SessionController::new(
        SessionSettings::default(),
        store,
        Arc::new(BridgeProcess::default()),
        AdapterWatcher::system(),
        NetworkConfigurator::system(),
        Arc::new(NoOpEventSink),
    );

    let result = match action {
        ProxyAction::List => Ok(()),
        ProxyAction::Add { address } => controller.add_proxy(&address).await.map(|_| ()),
        ProxyAction::Delete { address } => {
            if !controller.delete_proxy(&address).await {
                eprintln!("Not registered: {address}");
            }
            Ok(())
        }
        ProxyAction::Select { address } => controller.switch_proxy(&address).await,
    };

    match result {
        Ok(()) => {
            console::print_list(&controller.status().await, json_output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Bridge from the flag, else the working directory, else `PATH`
fn resolve_bridge(flag: Option<&str>) -> PathBuf {
    if let Some(path) = flag {
        return expand_path(path);
    }

    let local = PathBuf::from(".").join(DEFAULT_BRIDGE_PROGRAM);
    if local.exists() {
        return local;
    }
    which::which("tun2socks").unwrap_or(local)
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Exit signals, registered with the OS when created
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
    #[cfg(windows)]
    close: tokio::signal::windows::CtrlClose,
}

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(windows)]
        {
            Ok(Self {
                ctrl_c: tokio::signal::windows::ctrl_c()?,
                close: tokio::signal::windows::ctrl_close()?,
            })
        }

        #[cfg(not(any(unix, windows)))]
        {
            Ok(Self {})
        }
    }

    /// Resolves on Ctrl-C, SIGTERM, or console close
    async fn recv(&mut self) {
        #[cfg(unix)]
        tokio::select! {
            _ = self.interrupt.recv() => tracing::info!("Ctrl+C received, shutting down"),
            _ = self.terminate.recv() => tracing::info!("SIGTERM received, shutting down"),
        }

        #[cfg(windows)]
        tokio::select! {
            _ = self.ctrl_c.recv() => tracing::info!("Ctrl+C received, shutting down"),
            _ = self.close.recv() => tracing::info!("Console closing, shutting down"),
        }

        #[cfg(not(any(unix, windows)))]
        std::future::pending::<()>().await;
    }
}

/// Install the exit handlers now and flip the returned flag on the first signal
fn watch_shutdown() -> std::io::Result<watch::Receiver<bool>> {
    let mut signals = ShutdownSignals::install()?;
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        signals.recv().await;
        let _ = tx.send(true);
    });
    Ok(rx)
}

/// Resolves once the flag is set
async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
