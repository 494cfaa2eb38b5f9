//! Driver: binds the engine to a transport and supervises its lifecycle.
//!
//! # Responsibilities
//! - Bind the listener and run application startup hooks
//! - Switch the application into production mode
//! - Own the accept loop; dispatch every connection on its own task
//! - Close exactly once: stop accepting, run shutdown hooks
//!
//! # Design Decisions
//! - States only move forward: Created → Starting → Listening → Closing → Closed
//! - `close` is idempotent and safe to call concurrently; every caller gets
//!   the same handle and hooks run once
//! - Closing stops the accept loop but never aborts in-flight connections

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use thiserror::Error;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;

use crate::dispatch::Engine;
use crate::http::BoxError;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::transport::Transport;

/// Driver lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Created,
    Starting,
    Listening,
    Closing,
    Closed,
}

/// Error type for driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver cannot start from state {0:?}")]
    InvalidState(DriverState),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("startup hook failed: {0}")]
    Startup(#[source] BoxError),

    #[error("driver was never started")]
    NotStarted,
}

/// Where a started driver is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    scheme: &'static str,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    /// Base URL, e.g. `http://127.0.0.1:8080`.
    pub fn url(&self) -> String {
        format!("{}://{}", self.scheme, self.local_addr)
    }
}

impl fmt::Display for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

pub struct Driver {
    engine: Arc<Engine>,
    transport: Arc<dyn Transport>,
    max_connections: usize,
    state: Mutex<DriverState>,
    handle: OnceLock<ServerHandle>,
    closed: OnceCell<ServerHandle>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Driver {
    pub fn new(engine: Engine, transport: impl Transport) -> Self {
        Self {
            engine: Arc::new(engine),
            transport: Arc::new(transport),
            max_connections: 10_000,
            state: Mutex::new(DriverState::Created),
            handle: OnceLock::new(),
            closed: OnceCell::new(),
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
            accept_task: Mutex::new(None),
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: DriverState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Open connections right now.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Bind, run startup hooks, enter production mode and start accepting.
    pub async fn start(&self, address: IpAddr, port: u16) -> Result<ServerHandle, DriverError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != DriverState::Created {
                return Err(DriverError::InvalidState(*state));
            }
            *state = DriverState::Starting;
        }

        let addr = SocketAddr::new(address, port);
        let listener = match self.transport.bind(addr, self.max_connections).await {
            Ok(listener) => listener,
            Err(e) => {
                self.set_state(DriverState::Closed);
                return Err(e.into());
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(e) => {
                self.set_state(DriverState::Closed);
                return Err(e.into());
            }
        };

        let app = self.engine.app();
        if let Err(e) = app.run_startup_hooks().await {
            self.set_state(DriverState::Closed);
            return Err(DriverError::Startup(e));
        }
        app.set_production(true);

        let handle = ServerHandle {
            local_addr,
            scheme: self.transport.scheme(),
        };
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.transport),
            Arc::clone(&self.engine),
            self.tracker.clone(),
            self.shutdown.subscribe(),
        ));
        *self.accept_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        let _ = self.handle.set(handle.clone());
        self.set_state(DriverState::Listening);

        tracing::info!(
            address = %handle.local_addr(),
            scheme = handle.scheme(),
            isolation = ?self.engine.isolation(),
            "Driver listening"
        );
        Ok(handle)
    }

    /// Stop accepting and run shutdown hooks. Later calls return the same handle.
    pub async fn close(&self) -> Result<ServerHandle, DriverError> {
        let handle = self.handle.get().cloned().ok_or(DriverError::NotStarted)?;
        let closed = self
            .closed
            .get_or_init(|| self.shut_down(handle))
            .await;
        Ok(closed.clone())
    }

    async fn shut_down(&self, handle: ServerHandle) -> ServerHandle {
        self.set_state(DriverState::Closing);
        tracing::info!(
            active_connections = self.active_connections(),
            listeners = self.shutdown.receiver_count(),
            "Driver closing"
        );

        self.shutdown.trigger();
        let task = self.accept_task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Accept loop ended abnormally");
            }
        }

        self.engine.app().close().await;
        self.set_state(DriverState::Closed);
        tracing::info!(address = %handle.local_addr(), "Driver closed");
        handle
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("state", &self.state())
            .field("handle", &self.handle.get())
            .field("active_connections", &self.active_connections())
            .finish()
    }
}

async fn accept_loop(
    listener: Listener,
    transport: Arc<dyn Transport>,
    engine: Arc<Engine>,
    tracker: ConnectionTracker,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Accept loop stopped");
                break;
            }
            accepted = listener.accept() => {
                let (stream, remote, permit) = match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                };

                let guard = tracker.track();
                let connection = transport.serve(stream, remote, Arc::clone(&engine));
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::debug!(
                            connection_id = %guard.id(),
                            peer_addr = %remote,
                            error = %e,
                            "Connection ended with error"
                        );
                    }
                    drop(permit);
                    drop(guard);
                });
            }
        }
    }
}
