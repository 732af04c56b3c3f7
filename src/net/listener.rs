//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Serve each connection as HTTP/1.1 with a request-head read deadline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::{body::Incoming, server::conn::http1, service::service_fn, Request};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tower::ServiceExt;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
    /// The connection limit semaphore was closed.
    #[error("Connection limiter closed")]
    Closed,
}

/// Resolve a configured bind address. A leading `:` means all interfaces.
pub fn resolve_bind_address(raw: &str) -> Option<SocketAddr> {
    let candidate = if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    };
    candidate.parse().ok()
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Deadline for reading a request head.
    read_timeout: Duration,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = resolve_bind_address(&config.bind_address).ok_or_else(|| {
            ListenerError::Bind(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address {:?}", config.bind_address),
            ))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_tcp(listener, config))
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(listener: TcpListener, config: &ListenerConfig) -> Self {
        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(
                address = %local_addr,
                max_connections = config.max_connections,
                read_timeout = ?config.read_timeout,
                "Listener bound"
            );
        }

        Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            read_timeout: config.read_timeout,
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, OwnedSemaphorePermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, permit))
    }

    /// Accept connections and serve `router` on each until `shutdown` fires.
    pub async fn serve(self, router: Router, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        loop {
            tokio::select! {
                accepted = self.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    tokio::spawn(serve_connection(stream, peer, permit, router.clone(), self.read_timeout));
                }
                _ = shutdown.recv() => {
                    tracing::info!("Listener received shutdown signal, no longer accepting");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: OwnedSemaphorePermit,
    router: Router,
    read_timeout: Duration,
) {
    let service = service_fn(move |request: Request<Incoming>| router.clone().oneshot(request));

    let result = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout)
        .serve_connection(TokioIo::new(stream), service)
        .await;

    if let Err(e) = result {
        tracing::debug!(peer_addr = %peer, error = %e, "Connection closed with error");
    }
}
