//! Persistent fetch server.
//!
//! The server side of the socket protocol: each connection carries one
//! request message, the named backend runs in-process, and one response
//! message is written back before the connection closes.

use crawlkit_core::{NormalizedResponse, codec};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{self, BackendFactory, BackendKind, StandardBackendFactory};
use crate::config::EngineConfig;
use crate::error::FetchError;
use crate::host::socket;

/// How long a client gets to send its request.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// State shared by connection tasks.
struct SharedState {
    config: Arc<EngineConfig>,
    factory: Arc<dyn BackendFactory>,
}

/// TCP server running backends on behalf of [`ServerBackend`](crate::backend::ServerBackend) clients.
pub struct FetchServer {
    listener: TcpListener,
    state: Arc<SharedState>,
    shutdown: Arc<Notify>,
}

impl std::fmt::Debug for FetchServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchServer")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl FetchServer {
    /// Binds with the standard backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs, config: EngineConfig) -> Result<Self, FetchError> {
        let config = Arc::new(config);
        let factory = Arc::new(StandardBackendFactory::new(Arc::clone(&config)));
        Self::bind_with_factory(addr, config, factory).await
    }

    /// Binds with a custom backend factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind_with_factory(
        addr: impl ToSocketAddrs,
        config: Arc<EngineConfig>,
        factory: Arc<dyn BackendFactory>,
    ) -> Result<Self, FetchError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(SharedState { config, factory }),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, FetchError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops [`serve`](Self::serve) when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Accepts connections until shut down. Each connection gets its own task.
    pub async fn serve(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(%addr, "Fetch server listening"),
            Err(e) => warn!(error = %e, "Fetch server listening on unknown address"),
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &state).await {
                                warn!(%peer, error = %e, "Connection failed");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "Accept failed"),
                },
                () = self.shutdown.notified() => {
                    info!("Fetch server shutting down");
                    break;
                }
            }
        }
    }
}

#[instrument(skip_all, fields(peer = ?stream.peer_addr().ok()))]
async fn handle_connection(mut stream: TcpStream, state: &SharedState) -> Result<(), FetchError> {
    let frames = socket::read_message(&mut stream, REQUEST_READ_TIMEOUT).await?;

    let response = match codec::request_from_frames(frames) {
        Ok((request, timeout)) => {
            debug!(url = %request.url, backend = ?request.backend, "Serving request");
            backend::run_named(
                &state.config,
                state.factory.as_ref(),
                &request,
                timeout,
                BackendKind::Server,
            )
            .await
        }
        Err(e) => {
            warn!(error = %e, "Malformed request");
            NormalizedResponse::failed("", FetchError::from(e).to_string())
        }
    };

    socket::write_message(&mut stream, &codec::encode_response(&response)).await
}

// ============================================================================
// Tests
// ============================================================================
