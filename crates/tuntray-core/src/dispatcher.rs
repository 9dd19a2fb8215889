//! Command dispatcher
//!
//! Front-ends never call the controller directly. They send
//! [`SessionCommand`]s through a [`DispatcherHandle`]; a single
//! [`Dispatcher`] task executes them in arrival order and answers each on
//! its own oneshot channel.
//!
//! When the last handle is dropped, or a `Shutdown` command arrives, the
//! dispatcher runs the controller's exit handler and returns.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::session::{SessionController, SessionStatus};

/// Default depth of the command queue
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// A request to the session controller
#[derive(Debug)]
pub enum SessionCommand {
    /// Start through `proxy`, or through the selected proxy when `None`
    Start {
        proxy: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    SwitchProxy {
        proxy: String,
        reply: oneshot::Sender<Result<()>>,
    },
    AddProxy {
        address: String,
        reply: oneshot::Sender<Result<String>>,
    },
    DeleteProxy {
        address: String,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
}

impl SessionCommand {
    fn name(&self) -> &'static str {
        match self {
            SessionCommand::Start { .. } => "start",
            SessionCommand::Stop { .. } => "stop",
            SessionCommand::SwitchProxy { .. } => "switch",
            SessionCommand::AddProxy { .. } => "add",
            SessionCommand::DeleteProxy { .. } => "delete",
            SessionCommand::Status { .. } => "status",
            SessionCommand::Shutdown { .. } => "shutdown",
        }
    }
}

/// Create a dispatcher for `controller` and a handle to feed it
pub fn channel(
    controller: Arc<SessionController>,
    depth: usize,
) -> (DispatcherHandle, Dispatcher) {
    let (tx, rx) = mpsc::channel(depth);
    (DispatcherHandle { tx }, Dispatcher { controller, rx })
}

/// The loop that owns access to the controller
pub struct Dispatcher {
    controller: Arc<SessionController>,
    rx: mpsc::Receiver<SessionCommand>,
}

impl Dispatcher {
    /// Execute commands until shutdown
    ///
    /// Returns the exit handler's result.
    pub async fn run(mut self) -> Result<()> {
        info!("Dispatcher started");

        while let Some(command) = self.rx.recv().await {
            debug!("Dispatching {}", command.name());
            match command {
                SessionCommand::Start { proxy, reply } => {
                    let result = match proxy {
                        Some(proxy) => self.controller.start(&proxy).await,
                        None => self.controller.start_selected().await,
                    };
                    send_reply(reply, result);
                }
                SessionCommand::Stop { reply } => {
                    send_reply(reply, self.controller.stop().await);
                }
                SessionCommand::SwitchProxy { proxy, reply } => {
                    send_reply(reply, self.controller.switch_proxy(&proxy).await);
                }
                SessionCommand::AddProxy { address, reply } => {
                    send_reply(reply, self.controller.add_proxy(&address).await);
                }
                SessionCommand::DeleteProxy { address, reply } => {
                    send_reply(reply, self.controller.delete_proxy(&address).await);
                }
                SessionCommand::Status { reply } => {
                    send_reply(reply, self.controller.status().await);
                }
                SessionCommand::Shutdown { reply } => {
                    self.rx.close();
                    let result = self.controller.shutdown().await;
                    if let Err(e) = &result {
                        warn!("Shutdown failed: {}", e);
                    }
                    send_reply(reply, result);
                    info!("Dispatcher stopped");
                    return Ok(());
                }
            }
        }

        info!("All handles dropped, shutting down");
        self.controller.shutdown().await
    }
}

fn send_reply<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        debug!("Caller went away before the reply");
    }
}

/// Cloneable sender side of the dispatcher
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl DispatcherHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SessionError::DispatcherClosed)?;
        rx.await.map_err(|_| SessionError::DispatcherClosed)
    }

    pub async fn start(&self, proxy: Option<String>) -> Result<()> {
        self.request(|reply| SessionCommand::Start { proxy, reply })
            .await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Stop { reply }).await?
    }

    pub async fn switch_proxy(&self, proxy: impl Into<String>) -> Result<()> {
        let proxy = proxy.into();
        self.request(|reply| SessionCommand::SwitchProxy { proxy, reply })
            .await?
    }

    pub async fn add_proxy(&self, address: impl Into<String>) -> Result<String> {
        let address = address.into();
        self.request(|reply| SessionCommand::AddProxy { address, reply })
            .await?
    }

    pub async fn delete_proxy(&self, address: impl Into<String>) -> Result<bool> {
        let address = address.into();
        self.request(|reply| SessionCommand::DeleteProxy { address, reply })
            .await
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.request(|reply| SessionCommand::Status { reply }).await
    }

    /// Ask the dispatcher to run the exit handler and stop
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Shutdown { reply })
            .await?
    }
}
