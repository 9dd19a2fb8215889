//! Interactive console for `tuntray run`
//!
//! Reads one command per line from stdin and forwards it to the session
//! dispatcher. State and registry changes are printed by the event sink;
//! this module only prints answers to queries.

use std::future::Future;
use tokio::io::{AsyncBufReadExt, BufReader};
use tuntray_core::events::format_registry;
use tuntray_core::{DispatcherHandle, SessionError, SessionStatus};

const HELP: &str = "\
Commands:
  start [PROXY]   start a session (through the selected proxy by default)
  stop            stop the session
  use PROXY       select a proxy for the next start
  add PROXY       register a proxy
  delete PROXY    remove a proxy
  list            show registered proxies
  status          show session status
  quit            stop and exit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(Option<String>),
    Stop,
    Use(String),
    Add(String),
    Delete(String),
    List,
    Status,
    Help,
    Quit,
}

/// Parse one input line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let argument = |name: &str| {
        if rest.is_empty() {
            Err(format!("Usage: {verb} {name}"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "start" => ConsoleCommand::Start((!rest.is_empty()).then(|| rest.to_string())),
        "stop" => ConsoleCommand::Stop,
        "use" | "switch" | "select" => ConsoleCommand::Use(argument("PROXY")?),
        "add" => ConsoleCommand::Add(argument("PROXY")?),
        "delete" | "del" | "rm" => ConsoleCommand::Delete(argument("PROXY")?),
        "list" | "ls" => ConsoleCommand::List,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command: {other} (try `help`)")),
    };
    Ok(Some(command))
}

/// Read commands until `quit`, stdin EOF, or `shutdown` resolves
pub async fn run_console<F>(handle: &DispatcherHandle, json_output: bool, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tokio::pin!(shutdown);

    if !json_output {
        println!("{HELP}");
    }

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = &mut shutdown => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("Console input closed");
                break;
            }
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        if command == ConsoleCommand::Quit {
            break;
        }
        if let Err(SessionError::DispatcherClosed) = execute(handle, command, json_output).await {
            eprintln!("Error: {}", SessionError::DispatcherClosed);
            break;
        }
    }
}

/// Run one command; failures of session operations are reported by the event sink
async fn execute(
    handle: &DispatcherHandle,
    command: ConsoleCommand,
    json_output: bool,
) -> Result<(), SessionError> {
    let result = match command {
        ConsoleCommand::Start(proxy) => handle.start(proxy).await,
        ConsoleCommand::Stop => handle.stop().await,
        ConsoleCommand::Use(proxy) => handle.switch_proxy(proxy).await,
        ConsoleCommand::Add(address) => handle.add_proxy(address).await.map(|_| ()),
        ConsoleCommand::Delete(address) => {
            let deleted = handle.delete_proxy(address.clone()).await?;
            if !deleted {
                println!("Not registered: {address}");
            }
            Ok(())
        }
        ConsoleCommand::List => {
            let status = handle.status().await?;
            print_list(&status, json_output);
            Ok(())
        }
        ConsoleCommand::Status => {
            let status = handle.status().await?;
            print_status(&status, json_output);
            Ok(())
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };

    match result {
        Err(SessionError::DispatcherClosed) => Err(SessionError::DispatcherClosed),
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

pub fn print_list(status: &SessionStatus, json_output: bool) {
    let selected = status.selected_proxy.as_deref().unwrap_or("");
    if json_output {
        println!(
            "{}",
            serde_json::json!({ "proxies": status.proxies, "selected": selected })
        );
    } else {
        println!("{}", format_registry(&status.proxies, selected));
    }
}

fn print_status(status: &SessionStatus, json_output: bool) {
    if json_output {
        println!("{}", serde_json::to_string(status).unwrap_or_default());
        return;
    }

    println!("State:    {}", status.state);
    println!("Adapter:  {}", status.adapter);
    println!(
        "Proxy:    {}",
        status.active_proxy.as_deref().unwrap_or("-")
    );
    println!(
        "Selected: {}",
        status.selected_proxy.as_deref().unwrap_or("-")
    );
    if let (Some(id), Some(started_at)) = (status.session_id, status.started_at) {
        println!("Session:  {id} (since {})", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(pid) = status.bridge_pid {
        println!("Bridge:   pid {pid}");
    }
}
