//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize the Prometheus exporter when configured
//! - Build every component from the validated configuration
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid prometheus address {0:?}")]
    MetricsAddress(String),
    #[error("failed to start prometheus exporter: {0}")]
    Metrics(#[from] BuildError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Run the proxy until SIGINT or SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    if let Some(addr) = &config.observability.prometheus_address {
        let socket: SocketAddr = addr
            .parse()
            .map_err(|_| StartupError::MetricsAddress(addr.clone()))?;
        metrics::init_exporter(socket)?;
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = HttpServer::new(config);

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    server.run(listener, receiver).await?;
    Ok(())
}
