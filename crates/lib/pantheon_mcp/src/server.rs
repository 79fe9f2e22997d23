//! Server lifecycle: initialize, serve, drain, close.
//!
//! `run` resolves credentials, constructs the backend and probes it before
//! reading a single frame. Any failure there is fatal and nothing is ever
//! answered; a shutdown request during startup closes the server without
//! waiting for the probe. Once ready, every `tools/call` runs on its own task; shutdown
//! (cancellation or end of input) stops reading and gives in-flight calls a
//! bounded drain window before abandoning them.

use std::sync::Arc;
use std::time::Duration;

use pantheon_core::backend::{Backend, BackendError};
use pantheon_core::credentials::{Credential, CredentialError, CredentialResolver};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::protocol::{
    CallParams, INVALID_PARAMS, METHOD_NOT_FOUND, Request, Response, ServerInfo, initialize_result,
};
use crate::registry::ToolRegistry;
use crate::schema::ToolDefinition;
use crate::transport::{ResponseSink, Transport};

/// Default bound on how long in-flight calls may run after shutdown starts.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Enough for every transition of one run.
const TRANSITION_CAPACITY: usize = 8;

/// Process states. Progression is monotonic; a fatal startup failure jumps
/// from `Initializing` straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    Created,
    Initializing,
    Ready,
    ShuttingDown,
    Closed,
}

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    NoCredentials(#[from] CredentialError),

    #[error("failed to initialize backend: {0}")]
    BackendInit(#[source] BackendError),

    #[error("backend connectivity check failed: {0}")]
    ProbeFailed(#[source] BackendError),
}

pub struct McpServer<B: Backend> {
    info: ServerInfo,
    registry: Arc<ToolRegistry<B::Operation>>,
    drain_timeout: Duration,
    state: watch::Sender<ServerState>,
    transitions: broadcast::Sender<ServerState>,
}

impl<B: Backend> McpServer<B> {
    pub fn new(info: ServerInfo, registry: ToolRegistry<B::Operation>) -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            info,
            registry: Arc::new(registry),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            state,
            transitions,
        }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Observe the current state (including after `run` has consumed the server).
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Receive every state entered from now on, in order. Unlike
    /// [`subscribe`](Self::subscribe), intermediate states are never skipped.
    pub fn transitions(&self) -> broadcast::Receiver<ServerState> {
        self.transitions.subscribe()
    }

    fn transition(&self, next: ServerState) {
        let previous = self.state.send_replace(next);
        // No receivers is fine.
        let _ = self.transitions.send(next);
        debug!(from = ?previous, to = ?next, "server state changed");
    }

    /// Initialize, serve until shutdown, then drain.
    ///
    /// Returns an error only for fatal startup failures; in that case no
    /// frame is read and the server ends `Closed` without passing `Ready`.
    /// Cancelling `shutdown` before `Ready` does the same but returns `Ok`.
    pub async fn run<F, R, W>(
        self,
        resolver: &CredentialResolver,
        connect: F,
        transport: Transport<R, W>,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError>
    where
        F: FnOnce(Credential) -> Result<B, BackendError>,
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.transition(ServerState::Initializing);
        let initialized = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            result = initialize(resolver, connect) => Some(result),
        };
        let backend = match initialized {
            None => {
                info!("shutdown requested during initialization");
                self.transition(ServerState::Closed);
                return Ok(());
            }
            Some(Ok(backend)) => backend,
            Some(Err(e)) => {
                error!(error = %e, "initialization failed");
                self.transition(ServerState::Closed);
                return Err(e);
            }
        };

        let dispatcher = Dispatcher::new(Arc::clone(&self.registry), Arc::new(backend));
        let (mut requests, sink) = transport.into_parts();
        let tracker = TaskTracker::new();
        let abandon = CancellationToken::new();

        self.transition(ServerState::Ready);
        info!(
            server = %self.info.name,
            tools = self.registry.len(),
            "server ready"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                next = requests.next() => next,
            };
            match next {
                Ok(Some(request)) => {
                    self.handle(request, &dispatcher, &sink, &tracker, &abandon).await;
                }
                Ok(None) => {
                    info!("end of input");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read from transport");
                    break;
                }
            }
        }

        self.transition(ServerState::ShuttingDown);
        tracker.close();
        let in_flight = tracker.len();
        if in_flight > 0 {
            info!(
                in_flight,
                drain_ms = self.drain_timeout.as_millis() as u64,
                "draining in-flight calls"
            );
        }
        if tokio::time::timeout(self.drain_timeout, tracker.wait()).await.is_err() {
            warn!(abandoned = tracker.len(), "drain window elapsed, abandoning in-flight calls");
            abandon.cancel();
        }

        self.transition(ServerState::Closed);
        info!("server closed");
        Ok(())
    }

    async fn handle<W>(
        &self,
        request: Request,
        dispatcher: &Dispatcher<B>,
        sink: &ResponseSink<W>,
        tracker: &TaskTracker,
        abandon: &CancellationToken,
    ) where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Some(id) = request.id else {
            debug!(method = %request.method, "ignoring notification");
            return;
        };

        let response = match request.method.as_str() {
            "initialize" => {
                Response::success(id, initialize_result(&self.info, request.params.as_ref()))
            }
            "ping" => Response::success(id, json!({})),
            "tools/list" => Response::from_payload(
                id,
                &ToolList {
                    tools: self.registry.list(),
                },
            ),
            "tools/call" => match CallParams::parse(request.params) {
                Ok(params) => {
                    spawn_call(
                        id,
                        params,
                        dispatcher.clone(),
                        sink.clone(),
                        tracker,
                        abandon.clone(),
                    );
                    return;
                }
                Err(reason) => {
                    Response::failure(id, INVALID_PARAMS, format!("Invalid params: {reason}"))
                }
            },
            other => Response::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };

        send(sink, &response).await;
    }
}

#[derive(Serialize)]
struct ToolList<'a> {
    tools: Vec<&'a ToolDefinition>,
}

async fn initialize<B, F>(resolver: &CredentialResolver, connect: F) -> Result<B, ServerError>
where
    B: Backend,
    F: FnOnce(Credential) -> Result<B, BackendError>,
{
    let credential = resolver.resolve()?;
    let backend = connect(credential).map_err(ServerError::BackendInit)?;
    backend.probe().await.map_err(ServerError::ProbeFailed)?;
    info!("backend connectivity verified");
    Ok(backend)
}

fn spawn_call<B, W>(
    id: Value,
    params: CallParams,
    dispatcher: Dispatcher<B>,
    sink: ResponseSink<W>,
    tracker: &TaskTracker,
    abandon: CancellationToken,
) where
    B: Backend,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tracker.spawn(async move {
        let CallParams { name, arguments } = params;
        tokio::select! {
            biased;
            _ = abandon.cancelled() => {
                warn!(tool = %name, id = %id, "call abandoned");
            }
            result = dispatcher.call(&name, &arguments) => {
                send(&sink, &Response::from_payload(id, &result)).await;
            }
        }
    });
}

async fn send<W: AsyncWrite + Unpin + Send>(sink: &ResponseSink<W>, response: &Response) {
    if let Err(e) = sink.send(response).await {
        warn!(id = %response.id, error = %e, "failed to write response");
    }
}
