//! TUN session controller
//!
//! [`SessionController`] owns the single session and the proxy registry and
//! drives the bridge, the adapter watcher and the network configurator
//! through the session lifecycle:
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//!                |                      |
//!                +--> Stopped           +--> Failed (bridge kill failed)
//! ```
//!
//! All mutating operations hold the write half of one lock for their whole
//! duration, adapter wait included, so a second Start that races the first
//! blocks and then observes `AlreadyRunning`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapter::AdapterWatcher;
use crate::bridge::{BridgeChild, BridgeLauncher};
use crate::config_store::{load_registry, AppConfig, ConfigStore};
use crate::defaults::DEFAULT_ADAPTER_TIMEOUT;
use crate::error::{Result, SessionError};
use crate::events::SessionEventSink;
use crate::netconfig::{AdapterSettings, NetworkConfigurator};
use crate::registry::ProxyRegistry;
use crate::support::SupportFile;

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    /// The bridge could not be killed; Start and Stop are still accepted
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Fixed parameters of every session started by a controller
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub adapter: AdapterSettings,
    pub adapter_timeout: Duration,
    /// File to put next to the bridge before spawning it
    pub support_file: Option<SupportFile>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            adapter: AdapterSettings::default(),
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            support_file: SupportFile::platform_default(),
        }
    }
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub adapter: String,
    pub active_proxy: Option<String>,
    pub selected_proxy: Option<String>,
    pub proxies: Vec<String>,
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub bridge_pid: Option<u32>,
}

#[derive(Default)]
struct Session {
    state: SessionState,
    active_proxy: String,
    bridge: Option<Box<dyn BridgeChild>>,
    id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
}

impl Session {
    fn clear(&mut self) {
        self.active_proxy.clear();
        self.id = None;
        self.started_at = None;
    }
}

struct Inner {
    session: Session,
    registry: ProxyRegistry,
    config: AppConfig,
}

/// Owner of the session and the proxy registry
///
/// Share it behind an `Arc`; every operation takes `&self`.
pub struct SessionController {
    settings: SessionSettings,
    inner: RwLock<Inner>,
    store: Arc<dyn ConfigStore>,
    launcher: Arc<dyn BridgeLauncher>,
    watcher: AdapterWatcher,
    network: NetworkConfigurator,
    events: Arc<dyn SessionEventSink>,
    shut_down: AtomicBool,
}

impl SessionController {
    /// Create a controller, loading the registry from `store`
    pub fn new(
        settings: SessionSettings,
        store: Arc<dyn ConfigStore>,
        launcher: Arc<dyn BridgeLauncher>,
        watcher: AdapterWatcher,
        network: NetworkConfigurator,
        events: Arc<dyn SessionEventSink>,
    ) -> Self {
        let (registry, config) = load_registry(store.as_ref());
        Self {
            settings,
            inner: RwLock::new(Inner {
                session: Session::default(),
                registry,
                config,
            }),
            store,
            launcher,
            watcher,
            network,
            events,
            shut_down: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.session.state
    }

    /// Copy of the current registry
    pub async fn registry(&self) -> ProxyRegistry {
        self.inner.read().await.registry.clone()
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.read().await;
        let session = &inner.session;
        SessionStatus {
            state: session.state,
            adapter: self.settings.adapter.name.clone(),
            active_proxy: non_empty(&session.active_proxy),
            selected_proxy: non_empty(inner.registry.selected()),
            proxies: inner.registry.entries().to_vec(),
            session_id: session.id,
            started_at: session.started_at,
            bridge_pid: session.bridge.as_ref().and_then(|b| b.pid()),
        }
    }

    /// Start a session through `proxy`
    ///
    /// All-or-nothing: on failure the bridge is killed and the session is
    /// back to `Stopped` before the error is returned.
    pub async fn start(&self, proxy: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        self.start_locked(&mut inner, proxy.trim()).await
    }

    /// Start a session through the selected proxy
    pub async fn start_selected(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        let proxy = inner.registry.selected().to_string();
        self.start_locked(&mut inner, &proxy).await
    }

    /// Stop the session; a no-op when already stopped
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        self.stop_locked(&mut inner).await
    }

    /// Select a different proxy
    ///
    /// A running session keeps its bridge and proxy; the new selection is
    /// used by the next start.
    pub async fn switch_proxy(&self, proxy: &str) -> Result<()> {
        let proxy = proxy.trim();
        let mut inner = self.inner.write().await;
        let changed = match inner.registry.select(proxy) {
            Ok(changed) => changed,
            Err(e) => return Err(self.fail("switch", e.into()).await),
        };
        if !changed {
            return Ok(());
        }

        info!("Selected proxy {}", proxy);
        if inner.session.state == SessionState::Running {
            info!(
                "Session keeps {} until restarted",
                inner.session.active_proxy
            );
        }
        self.persist(&mut inner).await;
        Ok(())
    }

    /// Register a proxy, returning the stored (trimmed) address
    pub async fn add_proxy(&self, address: &str) -> Result<String> {
        let mut inner = self.inner.write().await;
        let stored = match inner.registry.add(address) {
            Ok(stored) => stored,
            Err(e) => return Err(self.fail("add", e.into()).await),
        };
        info!("Added proxy {}", stored);
        self.persist(&mut inner).await;
        Ok(stored)
    }

    /// Remove a proxy; returns false when it was not registered
    pub async fn delete_proxy(&self, address: &str) -> bool {
        let address = address.trim();
        let mut inner = self.inner.write().await;
        if !inner.registry.delete(address) {
            return false;
        }
        info!("Deleted proxy {}", address);
        self.persist(&mut inner).await;
        true
    }

    /// Exit handler: stop whatever is running, at most once per controller
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Shutting down session controller");
        let mut inner = self.inner.write().await;
        if inner.session.state == SessionState::Stopped {
            return Ok(());
        }
        self.stop_locked(&mut inner).await
    }

    async fn start_locked(&self, inner: &mut Inner, proxy: &str) -> Result<()> {
        if !matches!(
            inner.session.state,
            SessionState::Stopped | SessionState::Failed
        ) {
            return Err(self.fail("start", SessionError::AlreadyRunning).await);
        }
        if proxy.is_empty() {
            return Err(self.fail("start", SessionError::NoProxySelected).await);
        }
        if !inner.registry.contains(proxy) {
            return Err(self
                .fail("start", SessionError::UnknownProxy(proxy.to_string()))
                .await);
        }

        self.transition(inner, SessionState::Starting).await;
        info!("Starting session through {}", proxy);

        if let Err(err) = self.bring_up(inner, proxy).await {
            let adapter_touched = matches!(err, SessionError::NetworkConfigFailed(_));
            self.roll_back(inner, adapter_touched).await;
            return Err(self.fail("start", err).await);
        }

        let id = Uuid::new_v4();
        let session = &mut inner.session;
        session.active_proxy = proxy.to_string();
        session.id = Some(id);
        session.started_at = Some(Utc::now());
        info!("Session {} running through {}", id, proxy);

        if matches!(inner.registry.select(proxy), Ok(true)) {
            self.persist(inner).await;
        }
        self.transition(inner, SessionState::Running).await;
        Ok(())
    }

    async fn bring_up(&self, inner: &mut Inner, proxy: &str) -> Result<()> {
        let adapter = &self.settings.adapter;

        if let Some(support) = &self.settings.support_file {
            support.ensure().await?;
        }

        let bridge = self.launcher.launch(&adapter.name, proxy).await?;
        inner.session.bridge = Some(bridge);

        self.watcher
            .wait_for_adapter(&adapter.name, self.settings.adapter_timeout)
            .await?;
        self.network.apply(adapter).await?;
        Ok(())
    }

    async fn roll_back(&self, inner: &mut Inner, revert_adapter: bool) {
        warn!("Start failed, rolling back");
        if let Some(mut bridge) = inner.session.bridge.take() {
            if let Err(e) = bridge.terminate().await {
                warn!("Failed to kill bridge during rollback: {}", e);
            }
        }
        if revert_adapter {
            self.network.revert(&self.settings.adapter.name).await;
        }
        inner.session.clear();
        self.transition(inner, SessionState::Stopped).await;
    }

    async fn stop_locked(&self, inner: &mut Inner) -> Result<()> {
        if inner.session.state == SessionState::Stopped {
            return Ok(());
        }

        self.transition(inner, SessionState::Stopping).await;
        self.network.revert(&self.settings.adapter.name).await;

        let killed = match inner.session.bridge.take() {
            Some(mut bridge) => bridge.terminate().await,
            None => Ok(()),
        };
        inner.session.clear();

        match killed {
            Ok(()) => {
                self.transition(inner, SessionState::Stopped).await;
                Ok(())
            }
            Err(e) => {
                self.transition(inner, SessionState::Failed).await;
                Err(self.fail("stop", e.into()).await)
            }
        }
    }

    async fn transition(&self, inner: &mut Inner, state: SessionState) {
        inner.session.state = state;
        info!("Session {}", state);
        if let Err(e) = self.events.emit_state_changed(state).await {
            warn!("Failed to emit state change: {}", e);
        }
    }

    /// Write the registry back to the store and notify listeners
    ///
    /// A failed write is logged; the in-memory change stands.
    async fn persist(&self, inner: &mut Inner) {
        inner.registry.write_to(&mut inner.config);
        if let Err(e) = self.store.save(&inner.config) {
            warn!("Failed to save configuration: {}", e);
        }
        if let Err(e) = self
            .events
            .emit_registry_changed(inner.registry.entries(), inner.registry.selected())
            .await
        {
            warn!("Failed to emit registry change: {}", e);
        }
    }

    async fn fail(&self, operation: &str, err: SessionError) -> SessionError {
        error!("{} failed: {}", operation, err);
        if let Err(e) = self.events.emit_error(operation, &err.to_string()).await {
            warn!("Failed to emit error: {}", e);
        }
        err
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netconfig::NetCommand;
    use crate::testing::{
        FakeLauncher, MemoryStore, Outcome, RecordedEvent, RecordingSink, ScriptedInterfaces,
        ScriptedRunner,
    };

    const PROXY_A: &str = "socks5://127.0.0.1:7890";
    const PROXY_B: &str = "http://10.0.0.2:3128";

    struct Harness {
        controller: SessionController,
        store: Arc<MemoryStore>,
        launcher: Arc<FakeLauncher>,
        interfaces: Arc<ScriptedInterfaces>,
        runner: Arc<ScriptedRunner>,
        sink: Arc<RecordingSink>,
    }

    fn harness_with(interfaces: ScriptedInterfaces) -> Harness {
        let store = Arc::new(MemoryStore::with_proxies(&[PROXY_A, PROXY_B], PROXY_A));
        let launcher = Arc::new(FakeLauncher::new());
        let interfaces = Arc::new(interfaces);
        let runner = Arc::new(ScriptedRunner::new());
        let sink = Arc::new(RecordingSink::new());

        let settings = SessionSettings {
            support_file: None,
            ..SessionSettings::default()
        };
        let controller = SessionController::new(
            settings,
            store.clone(),
            launcher.clone(),
            AdapterWatcher::new(interfaces.clone()),
            NetworkConfigurator::new(runner.clone()),
            sink.clone(),
        );

        Harness {
            controller,
            store,
            launcher,
            interfaces,
            runner,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with(ScriptedInterfaces::present("wintun"))
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let h = harness();

        h.controller.start(PROXY_A).await.unwrap();
        assert_eq!(h.controller.state().await, SessionState::Running);
        assert_eq!(
            h.launcher.launches(),
            vec![("wintun".to_string(), PROXY_A.to_string())]
        );
        assert_eq!(h.runner.calls().len(), 3);

        let status = h.controller.status().await;
        assert_eq!(status.active_proxy.as_deref(), Some(PROXY_A));
        assert!(status.session_id.is_some());
        assert!(status.bridge_pid.is_some());

        h.controller.stop().await.unwrap();
        assert_eq!(h.controller.state().await, SessionState::Stopped);
        assert_eq!(h.launcher.running(), 0);
        assert_eq!(h.runner.calls().len(), 7);
        assert_eq!(
            h.sink.states(),
            vec![
                SessionState::Starting,
                SessionState::Running,
                SessionState::Stopping,
                SessionState::Stopped
            ]
        );

        let status = h.controller.status().await;
        assert_eq!(status.active_proxy, None);
        assert_eq!(status.bridge_pid, None);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let h = harness();

        h.controller.stop().await.unwrap();
        assert!(h.runner.calls().is_empty());

        h.controller.start(PROXY_A).await.unwrap();
        h.controller.stop().await.unwrap();
        let after_first = h.runner.calls().len();

        h.controller.stop().await.unwrap();
        assert_eq!(h.runner.calls().len(), after_first);
        assert_eq!(h.controller.state().await, SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_start_preconditions() {
        let h = harness();

        assert!(matches!(
            h.controller.start("").await,
            Err(SessionError::NoProxySelected)
        ));
        assert!(matches!(
            h.controller.start("socks5://nowhere:1").await,
            Err(SessionError::UnknownProxy(_))
        ));
        assert!(h.launcher.launches().is_empty());

        h.controller.start(PROXY_A).await.unwrap();
        assert!(matches!(
            h.controller.start(PROXY_B).await,
            Err(SessionError::AlreadyRunning)
        ));
        assert_eq!(h.launcher.launches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_start_yields_one_session() {
        let h = harness_with(ScriptedInterfaces::appearing_after("wintun", 2));

        let (first, second) = tokio::join!(h.controller.start(PROXY_A), h.controller.start(PROXY_A));

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SessionError::AlreadyRunning))));
        assert_eq!(h.launcher.launches().len(), 1);
        assert_eq!(h.launcher.running(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_timeout_rolls_back() {
        let h = harness_with(ScriptedInterfaces::never());

        let err = h.controller.start(PROXY_A).await.unwrap_err();
        assert!(matches!(err, SessionError::AdapterTimeout { .. }));

        assert_eq!(h.controller.state().await, SessionState::Stopped);
        assert_eq!(h.launcher.launches().len(), 1);
        assert_eq!(h.launcher.running(), 0);
        assert!(h.runner.calls().is_empty());
        assert!(h.interfaces.polls() > 1);
        assert!(h
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, RecordedEvent::Error { operation, .. } if operation == "start")));
    }

    #[tokio::test]
    async fn test_enumeration_failure_rolls_back() {
        let h = harness_with(ScriptedInterfaces::failing());

        let err = h.controller.start(PROXY_A).await.unwrap_err();
        assert!(matches!(err, SessionError::EnumerationFailed(_)));
        assert_eq!(h.controller.state().await, SessionState::Stopped);
        assert_eq!(h.launcher.running(), 0);
    }

    #[tokio::test]
    async fn test_apply_failure_rolls_back_and_reverts() {
        let h = harness();
        h.runner.script(
            |c| matches!(c, NetCommand::SetStaticDns { .. }),
            vec![Outcome::Fail("The parameter is incorrect.")],
        );

        let err = h.controller.start(PROXY_A).await.unwrap_err();
        assert!(matches!(err, SessionError::NetworkConfigFailed(_)));
        assert_eq!(h.controller.state().await, SessionState::Stopped);
        assert_eq!(h.launcher.running(), 0);

        let calls = h.runner.calls();
        assert!(!calls
            .iter()
            .any(|c| matches!(c, NetCommand::AddDefaultRoute { .. })));
        assert!(matches!(
            calls.last(),
            Some(NetCommand::RemoveNetworkProfiles { .. })
        ));

        h.controller.start(PROXY_A).await.unwrap();
        assert_eq!(h.controller.state().await, SessionState::Running);
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_stopped() {
        let h = harness();
        h.launcher.set_fail_spawn(true);

        let err = h.controller.start(PROXY_A).await.unwrap_err();
        assert!(matches!(err, SessionError::SpawnError { .. }));
        assert_eq!(h.controller.state().await, SessionState::Stopped);
        assert!(h.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_support_file_fails_before_spawn() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_proxies(&[PROXY_A], PROXY_A));
        let launcher = Arc::new(FakeLauncher::new());
        let settings = SessionSettings {
            support_file: Some(SupportFile::new(
                temp_dir.path().join("wintun.dll"),
                temp_dir.path().join("wintun"),
            )),
            ..SessionSettings::default()
        };
        let controller = SessionController::new(
            settings,
            store,
            launcher.clone(),
            AdapterWatcher::new(Arc::new(ScriptedInterfaces::present("wintun"))),
            NetworkConfigurator::new(Arc::new(ScriptedRunner::new())),
            Arc::new(RecordingSink::new()),
        );

        let err = controller.start(PROXY_A).await.unwrap_err();
        assert!(matches!(err, SessionError::DependencyMissing { .. }));
        assert!(launcher.launches().is_empty());
        assert_eq!(controller.state().await, SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_kill_failure_enters_failed_and_recovers() {
        let h = harness();
        h.launcher.set_fail_kill(true);
        h.controller.start(PROXY_A).await.unwrap();

        let err = h.controller.stop().await.unwrap_err();
        assert!(matches!(err, SessionError::TerminateFailed(_)));
        assert_eq!(h.controller.state().await, SessionState::Failed);
        assert_eq!(h.controller.status().await.bridge_pid, None);

        h.launcher.set_fail_kill(false);
        h.controller.start(PROXY_B).await.unwrap();
        assert_eq!(h.controller.state().await, SessionState::Running);
    }

    #[tokio::test]
    async fn test_switch_while_running_only_updates_preference() {
        let h = harness();
        h.controller.start(PROXY_A).await.unwrap();
        let saves = h.store.save_count();

        h.controller.switch_proxy(PROXY_B).await.unwrap();

        let status = h.controller.status().await;
        assert_eq!(status.state, SessionState::Running);
        assert_eq!(status.active_proxy.as_deref(), Some(PROXY_A));
        assert_eq!(status.selected_proxy.as_deref(), Some(PROXY_B));
        assert_eq!(h.launcher.launches().len(), 1);
        assert_eq!(h.store.save_count(), saves + 1);
        assert_eq!(h.store.saved().unwrap().last_selected_proxy, PROXY_B);

        // Unchanged selection does not write.
        h.controller.switch_proxy(PROXY_B).await.unwrap();
        assert_eq!(h.store.save_count(), saves + 1);

        assert!(matches!(
            h.controller.switch_proxy("socks5://gone:1").await,
            Err(SessionError::UnknownProxy(_))
        ));
    }

    #[tokio::test]
    async fn test_start_with_other_proxy_persists_selection() {
        let h = harness();
        h.controller.start(PROXY_B).await.unwrap();
        assert_eq!(h.store.saved().unwrap().last_selected_proxy, PROXY_B);
    }

    #[tokio::test]
    async fn test_start_selected() {
        let h = harness();
        h.controller.switch_proxy(PROXY_B).await.unwrap();
        h.controller.start_selected().await.unwrap();
        assert_eq!(h.launcher.launches()[0].1, PROXY_B);
    }

    #[tokio::test]
    async fn test_switch_and_delete_trim_input() {
        let h = harness();

        h.controller.switch_proxy(" http://10.0.0.2:3128 ").await.unwrap();
        assert_eq!(h.store.saved().unwrap().last_selected_proxy, PROXY_B);

        assert!(h.controller.delete_proxy("\tsocks5://127.0.0.1:7890  ").await);
        let registry = h.controller.registry().await;
        assert!(!registry.contains(PROXY_A));
        assert_eq!(registry.selected(), PROXY_B);
    }

    #[tokio::test]
    async fn test_registry_mutations_persist_and_notify() {
        let h = harness();

        let stored = h.controller.add_proxy("  socks5://10.1.1.1:1080 ").await.unwrap();
        assert_eq!(stored, "socks5://10.1.1.1:1080");
        assert!(matches!(
            h.controller.add_proxy(PROXY_A).await,
            Err(SessionError::DuplicateAddress(_))
        ));
        assert!(matches!(
            h.controller.add_proxy(" ").await,
            Err(SessionError::EmptyAddress)
        ));

        assert!(h.controller.delete_proxy(PROXY_A).await);
        assert!(!h.controller.delete_proxy(PROXY_A).await);
        assert!(h.controller.delete_proxy(PROXY_B).await);
        assert!(h.controller.delete_proxy("socks5://10.1.1.1:1080").await);

        let saved = h.store.saved().unwrap();
        assert!(saved.proxies.is_empty());
        assert_eq!(saved.last_selected_proxy, "");
        assert_eq!(
            h.sink.events().last(),
            Some(&RecordedEvent::Registry {
                entries: vec![],
                selected: String::new()
            })
        );

        assert!(matches!(
            h.controller.start_selected().await,
            Err(SessionError::NoProxySelected)
        ));
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_in_memory_change() {
        let h = harness();
        h.store.set_fail_saves(true);

        h.controller.add_proxy("socks5://c:3").await.unwrap();
        assert!(h.controller.registry().await.contains("socks5://c:3"));
    }

    #[tokio::test]
    async fn test_shutdown_runs_once() {
        let h = harness();
        h.controller.start(PROXY_A).await.unwrap();

        h.controller.shutdown().await.unwrap();
        assert_eq!(h.controller.state().await, SessionState::Stopped);
        assert_eq!(h.launcher.running(), 0);
        let calls = h.runner.calls().len();

        h.controller.shutdown().await.unwrap();
        assert_eq!(h.runner.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_shutdown_when_stopped_runs_no_commands() {
        let h = harness();
        h.controller.shutdown().await.unwrap();
        assert!(h.runner.calls().is_empty());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionState::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }
}
