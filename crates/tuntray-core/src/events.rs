//! Session event sink
//!
//! This module provides the SessionEventSink trait for decoupling state
//! notifications from any particular front-end. Implementations can drive a
//! tray menu, write to stdout (CLI), or record events for tests.

use async_trait::async_trait;
use serde_json::json;

use crate::session::SessionState;

/// Event sink for session notifications
///
/// Emission is best-effort: the controller logs a failed emit and carries on.
#[async_trait]
pub trait SessionEventSink: Send + Sync {
    /// The session moved to a new state
    async fn emit_state_changed(&self, state: SessionState) -> Result<(), String>;

    /// The proxy list or selection changed; `selected` is empty when nothing is selected
    async fn emit_registry_changed(&self, entries: &[String], selected: &str)
        -> Result<(), String>;

    /// An operation failed
    async fn emit_error(&self, operation: &str, message: &str) -> Result<(), String>;
}

/// No-op event sink for headless use
#[derive(Default, Clone)]
pub struct NoOpEventSink;

#[async_trait]
impl SessionEventSink for NoOpEventSink {
    async fn emit_state_changed(&self, _state: SessionState) -> Result<(), String> {
        Ok(())
    }

    async fn emit_registry_changed(
        &self,
        _entries: &[String],
        _selected: &str,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn emit_error(&self, _operation: &str, _message: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Stdout event sink for CLI mode - prints events to console
#[derive(Default, Clone)]
pub struct StdoutEventSink {
    /// Whether to print in JSON format
    pub json_output: bool,
}

impl StdoutEventSink {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }
}

#[async_trait]
impl SessionEventSink for StdoutEventSink {
    async fn emit_state_changed(&self, state: SessionState) -> Result<(), String> {
        if self.json_output {
            println!("{}", json!({ "event": "state_changed", "state": state }));
        } else {
            println!("Session {state}");
        }
        Ok(())
    }

    async fn emit_registry_changed(
        &self,
        entries: &[String],
        selected: &str,
    ) -> Result<(), String> {
        if self.json_output {
            println!(
                "{}",
                json!({ "event": "registry_changed", "proxies": entries, "selected": selected })
            );
        } else {
            println!("{}", format_registry(entries, selected));
        }
        Ok(())
    }

    async fn emit_error(&self, operation: &str, message: &str) -> Result<(), String> {
        if self.json_output {
            println!(
                "{}",
                json!({ "event": "error", "operation": operation, "message": message })
            );
        } else {
            println!("[{operation}] {message}");
        }
        Ok(())
    }
}

/// Render the proxy list with the selected entry marked
pub fn format_registry(entries: &[String], selected: &str) -> String {
    if entries.is_empty() {
        return "No proxies configured".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            let marker = if entry == selected { '*' } else { ' ' };
            format!("{marker} {entry}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
