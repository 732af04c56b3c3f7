//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build every shared component once from configuration
//! - Hand each component explicit handles to the others it needs
//! - Assemble the proxy pipeline and the status endpoints into one router
//! - Serve the router on a bounded listener until shutdown

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::http::dispatch::Dispatcher;
use crate::http::pipeline::proxy_router;
use crate::http::status::{status_router, StatusState};
use crate::load_balancer::{pool::BackendPool, round_robin::RoundRobin, LoadBalancer};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics::Counters;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::security::rate_limit::SlidingWindowLimiter;

/// Shared components of a running proxy.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub health: Arc<CircuitBreaker>,
    pub counters: Arc<Counters>,
    pub started_at: Instant,
}

impl AppState {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let health = Arc::new(CircuitBreaker::new(config.circuit_breaker));
        let counters = Arc::new(Counters::new());
        let pool = BackendPool::from_config(&config.upstream);
        let balancer: Arc<dyn LoadBalancer> = Arc::new(RoundRobin::new(pool, health.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            balancer,
            health.clone(),
            counters.clone(),
            config.upstream.write_timeout,
        ));
        let limiter = Arc::new(SlidingWindowLimiter::new(config.rate_limit.requests_per_second));

        Self {
            dispatcher,
            limiter,
            health,
            counters,
            started_at: Instant::now(),
        }
    }
}

/// HTTP server for the dispatch proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let state = AppState::from_config(&config);
        let router = Self::build_router(&state);
        Self {
            router,
            state,
            config,
        }
    }

    fn build_router(state: &AppState) -> Router {
        let status = status_router(StatusState {
            counters: state.counters.clone(),
            health: state.health.clone(),
            started_at: state.started_at,
        });

        status.merge(proxy_router(state.dispatcher.clone(), state.limiter.clone()))
    }

    /// Run the server on the given listener until `shutdown` fires.
    pub async fn run(self, listener: Listener, shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        tracing::info!(
            address = %listener.local_addr().map_err(ListenerError::Bind)?,
            backends = ?self.config.upstream.backends,
            rate_limit = self.config.rate_limit.requests_per_second,
            "HTTP server starting"
        );

        listener.serve(self.router, shutdown).await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Shared components, for inspection while the server runs.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
