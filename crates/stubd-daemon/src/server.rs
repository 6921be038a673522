//! Stub server lifecycle and the test-author registration API.
//!
//! `StubServer` gates every operation on the Stopped → Started state machine,
//! owns the listener task, and fronts the reconciliation engine. The engine
//! lives behind one `std::sync::Mutex`: every mutation reconciles to
//! completion inside the lock, and the lock is never held across an await.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stubd_engine::{AbortReason, Action, Engine, PatternError, RequestSnapshot, ResponseSpec};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::routes;

// ---------------------------------------------------------------------------
// ServerError
// ---------------------------------------------------------------------------

/// Failures surfaced by the lifecycle and registration API.
#[derive(Debug)]
pub enum ServerError {
    /// Operation requires a running server.
    NotStarted,
    /// `start` called while already running.
    AlreadyStarted,
    /// A spec's pattern failed to compile at registration.
    InvalidPattern(PatternError),
    /// A pending observe was force-resolved by reset or stop.
    ObserveAborted(AbortReason),
    /// Listener bind/close failure, passed through verbatim; lifecycle state
    /// is unchanged.
    Transport(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::NotStarted => f.write_str("server has not been started"),
            ServerError::AlreadyStarted => f.write_str("server is already running"),
            ServerError::InvalidPattern(err) => err.fmt(f),
            ServerError::ObserveAborted(reason) => write!(f, "observe aborted: {reason}"),
            ServerError::Transport(err) => write!(f, "listener transport failure: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::InvalidPattern(err) => Some(err),
            ServerError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PatternError> for ServerError {
    fn from(err: PatternError) -> Self {
        ServerError::InvalidPattern(err)
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the API surface and the inbound handlers.
pub(crate) struct Shared {
    engine: Mutex<Engine>,
    running: AtomicBool,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            engine: Mutex::new(Engine::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Engine guard. Never held across an await.
    pub(crate) fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

enum Lifecycle {
    Stopped,
    Started {
        addr: SocketAddr,
        /// Taken when stop signals the listener; `None` after a failed stop.
        shutdown: Option<oneshot::Sender<()>>,
        /// Taken when stop awaits the close; `None` after a failed stop.
        serve: Option<JoinHandle<io::Result<()>>>,
    },
}

/// Programmable HTTP stub server.
///
/// Stopped (initial) → Started → Stopped. Registration, pending views, and
/// reset require Started; inbound calls reaching a stale listener while
/// Stopped are answered not-found.
pub struct StubServer {
    shared: Arc<Shared>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

impl Default for StubServer {
    fn default() -> Self {
        Self::new()
    }
}

impl StubServer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Stopped),
        }
    }

    pub fn is_started(&self) -> bool {
        self.shared.is_running()
    }

    /// Bound address while Started. With `config.port == 0` this is where the
    /// ephemeral port shows up.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Started { addr, .. } => Some(*addr),
            Lifecycle::Stopped => None,
        }
    }

    // -----------------------------------------------------------------------
    // start / stop
    // -----------------------------------------------------------------------

    /// Bind the listener and transition to Started.
    ///
    /// Fails with `AlreadyStarted` if running; a bind failure surfaces as
    /// `Transport` and leaves the server Stopped.
    pub async fn start(&self, config: ServerConfig) -> Result<(), ServerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(*lifecycle, Lifecycle::Started { .. }) {
            return Err(ServerError::AlreadyStarted);
        }

        let bind = SocketAddr::from(([127, 0, 0, 1], config.port));
        let listener = TcpListener::bind(bind).await.map_err(ServerError::Transport)?;
        let addr = listener.local_addr().map_err(ServerError::Transport)?;

        let router = routes::build_router(Arc::clone(&self.shared), &config.paths)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let serve = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        self.shared.set_running(true);
        *lifecycle = Lifecycle::Started {
            addr,
            shutdown: Some(shutdown),
            serve: Some(serve),
        };
        info!(%addr, paths = ?config.paths, "stub server started");
        Ok(())
    }

    /// Flush outstanding state, close the listener, and transition to
    /// Stopped.
    ///
    /// Fails with `NotStarted` if already Stopped. A close failure surfaces
    /// as `Transport` and leaves the state Started; calling stop again then
    /// completes the transition.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let Lifecycle::Started { addr, shutdown, serve } = &mut *lifecycle else {
            return Err(ServerError::NotStarted);
        };
        let addr = *addr;

        // Stale calls from here on are answered not-found by the handler.
        self.shared.set_running(false);

        // Open transactions are parked inside in-flight handlers; graceful
        // shutdown cannot drain until they are answered.
        self.shared.engine().flush(AbortReason::Stopped);

        if let Some(sender) = shutdown.take() {
            let _ = sender.send(());
        }
        if let Some(handle) = serve.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(ServerError::Transport(err)),
                Err(err) => {
                    return Err(ServerError::Transport(io::Error::new(
                        io::ErrorKind::Other,
                        err,
                    )))
                }
            }
        }

        *lifecycle = Lifecycle::Stopped;
        info!(%addr, "stub server stopped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Registration API
    // -----------------------------------------------------------------------

    /// Register a canned response for the next matching transaction.
    ///
    /// Reconciles synchronously: a matching open transaction is answered
    /// within this call, otherwise the spec waits for a later arrival.
    /// A spec with a positive `delay_ms` schedules its deferred write on the
    /// surrounding tokio runtime.
    pub fn respond(&self, spec: ResponseSpec) -> Result<(), ServerError> {
        self.ensure_started()?;
        let action = Action::respond(spec)?;
        self.shared.engine().register(action);
        Ok(())
    }

    /// Hand over the next matching request without answering it.
    ///
    /// Completes immediately if a matching transaction is already open,
    /// later otherwise. The transaction stays open either way. Rejected with
    /// `ObserveAborted` if the server is reset or stopped first.
    pub async fn observe(&self, spec: ResponseSpec) -> Result<RequestSnapshot, ServerError> {
        self.ensure_started()?;
        let (action, receiver) = Action::observe(&spec)?;
        self.shared.engine().register(action);
        match receiver.await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(reason)) => Err(ServerError::ObserveAborted(reason)),
            // Sender dropped without resolution; the engine is gone.
            Err(_) => Err(ServerError::ObserveAborted(AbortReason::Stopped)),
        }
    }

    /// Unconsumed respond specs, oldest first.
    pub fn pending_responses(&self) -> Result<Vec<ResponseSpec>, ServerError> {
        self.ensure_started()?;
        Ok(self.shared.engine().pending_responses())
    }

    /// Open transactions' request snapshots, oldest first.
    pub fn pending_requests(&self) -> Result<Vec<RequestSnapshot>, ServerError> {
        self.ensure_started()?;
        Ok(self.shared.engine().pending_requests())
    }

    /// Answer every open transaction not-found, reject pending observes, and
    /// clear both queues. Used between test cases to guarantee no leaked
    /// state.
    pub fn reset(&self) -> Result<(), ServerError> {
        self.ensure_started()?;
        self.shared.engine().flush(AbortReason::Reset);
        info!("stub server reset");
        Ok(())
    }

    fn ensure_started(&self) -> Result<(), ServerError> {
        if self.shared.is_running() {
            Ok(())
        } else {
            Err(ServerError::NotStarted)
        }
    }
}
