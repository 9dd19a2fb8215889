//! Test doubles for the host-facing seams

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::adapter::InterfaceSource;
use crate::bridge::{BridgeChild, BridgeError, BridgeLauncher};
use crate::config_store::{AppConfig, ConfigSource, ConfigStore, StoreError};
use crate::events::SessionEventSink;
use crate::netconfig::{CommandOutput, CommandRunner, NetCommand};
use crate::session::SessionState;

/// Interface list that gains a name after a fixed number of polls
pub struct ScriptedInterfaces {
    name: String,
    missing_polls: Option<usize>,
    fail: bool,
    polls: AtomicUsize,
}

impl ScriptedInterfaces {
    /// `name` is absent for the first `polls` enumerations
    pub fn appearing_after(name: &str, polls: usize) -> Self {
        Self {
            name: name.to_string(),
            missing_polls: Some(polls),
            fail: false,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn present(name: &str) -> Self {
        Self::appearing_after(name, 0)
    }

    pub fn never() -> Self {
        Self {
            name: String::new(),
            missing_polls: None,
            fail: false,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::never()
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl InterfaceSource for ScriptedInterfaces {
    fn interface_names(&self) -> io::Result<Vec<String>> {
        let seen = self.polls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }

        let mut names = vec!["lo".to_string(), "Ethernet".to_string()];
        if matches!(self.missing_polls, Some(n) if seen >= n) {
            names.push(self.name.clone());
        }
        Ok(names)
    }
}

/// Scripted result for one command execution
#[derive(Debug, Clone)]
pub enum Outcome {
    Fail(&'static str),
    SpawnError,
}

type Matcher = fn(&NetCommand) -> bool;

/// Command runner that records every command and fails on request
///
/// Commands succeed unless a script matches them; each matching execution
/// consumes one scripted outcome.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<NetCommand>>,
    scripts: Mutex<Vec<(Matcher, VecDeque<Outcome>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, matcher: Matcher, outcomes: Vec<Outcome>) {
        self.scripts
            .lock()
            .unwrap()
            .push((matcher, outcomes.into()));
    }

    pub fn calls(&self) -> Vec<NetCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &NetCommand) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());

        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .iter_mut()
            .find(|(matcher, outcomes)| matcher(command) && !outcomes.is_empty())
            .and_then(|(_, outcomes)| outcomes.pop_front());

        match outcome {
            None => Ok(CommandOutput::ok()),
            Some(Outcome::Fail(output)) => Ok(CommandOutput {
                success: false,
                status: "exit status: 1".to_string(),
                output: output.to_string(),
            }),
            Some(Outcome::SpawnError) => {
                Err(io::Error::new(io::ErrorKind::NotFound, "program not found"))
            }
        }
    }
}

/// Bridge launcher that hands out in-memory children
#[derive(Default)]
pub struct FakeLauncher {
    launches: Mutex<Vec<(String, String)>>,
    children: Mutex<Vec<Arc<AtomicBool>>>,
    next_pid: AtomicU32,
    fail_spawn: AtomicBool,
    fail_kill: AtomicBool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_kill(&self, fail: bool) {
        self.fail_kill.store(fail, Ordering::SeqCst);
    }

    /// `(adapter, proxy)` of every launch
    pub fn launches(&self) -> Vec<(String, String)> {
        self.launches.lock().unwrap().clone()
    }

    /// Children launched and not yet terminated
    pub fn running(&self) -> usize {
        self.children
            .lock()
            .unwrap()
            .iter()
            .filter(|alive| alive.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl BridgeLauncher for FakeLauncher {
    async fn launch(
        &self,
        adapter: &str,
        proxy: &str,
    ) -> Result<Box<dyn BridgeChild>, BridgeError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(BridgeError::Spawn {
                program: "tun2socks".to_string(),
                cause: io::Error::new(io::ErrorKind::NotFound, "not found"),
            });
        }

        self.launches
            .lock()
            .unwrap()
            .push((adapter.to_string(), proxy.to_string()));
        let alive = Arc::new(AtomicBool::new(true));
        self.children.lock().unwrap().push(alive.clone());

        Ok(Box::new(FakeChild {
            pid: 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst),
            alive,
            fail_kill: self.fail_kill.load(Ordering::SeqCst),
        }))
    }
}

struct FakeChild {
    pid: u32,
    alive: Arc<AtomicBool>,
    fail_kill: bool,
}

#[async_trait]
impl BridgeChild for FakeChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn terminate(&mut self) -> Result<(), BridgeError> {
        if self.fail_kill {
            return Err(BridgeError::Terminate(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "access denied",
            )));
        }
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// An event captured by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    State(SessionState),
    Registry { entries: Vec<String>, selected: String },
    Error { operation: String, message: String },
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SessionEventSink for RecordingSink {
    async fn emit_state_changed(&self, state: SessionState) -> Result<(), String> {
        self.events.lock().unwrap().push(RecordedEvent::State(state));
        Ok(())
    }

    async fn emit_registry_changed(
        &self,
        entries: &[String],
        selected: &str,
    ) -> Result<(), String> {
        self.events.lock().unwrap().push(RecordedEvent::Registry {
            entries: entries.to_vec(),
            selected: selected.to_string(),
        });
        Ok(())
    }

    async fn emit_error(&self, operation: &str, message: &str) -> Result<(), String> {
        self.events.lock().unwrap().push(RecordedEvent::Error {
            operation: operation.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// In-memory store that counts writes
#[derive(Default)]
pub struct MemoryStore {
    config: Mutex<Option<AppConfig>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with_proxies(proxies: &[&str], selected: &str) -> Self {
        let config = AppConfig {
            proxies: proxies.iter().map(|p| p.to_string()).collect(),
            last_selected_proxy: selected.to_string(),
            ..AppConfig::default()
        };
        Self {
            config: Mutex::new(Some(config)),
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Option<AppConfig> {
        self.config.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> ConfigSource {
        match self.config.lock().unwrap().clone() {
            Some(config) => ConfigSource::Current(config),
            None => ConfigSource::Missing,
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "memory".into(),
                cause: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.config.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    fn remove_legacy(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
