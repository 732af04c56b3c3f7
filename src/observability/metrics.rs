//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Process-wide request/response/error counters read by `/metrics`
//! - Prometheus-compatible series through the `metrics` facade
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_rate_limited_total` (counter): admissions denied
//! - `proxy_backend_outcomes_total` (counter): classified outcomes by backend
//! - `proxy_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - [`Counters`] are plain atomics owned by the server state, not globals
//! - Facade calls are no-ops until an exporter is installed

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

use crate::load_balancer::backend::BackendId;
use crate::resilience::circuit_breaker::CircuitState;

/// Request, response and error counts since startup.
#[derive(Debug, Default)]
pub struct Counters {
    requests: AtomicU64,
    responses: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub requests: u64,
    pub responses: u64,
    pub errors: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_response(&self) {
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("proxy_errors_total").increment(1);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("proxy_rate_limited_total").increment(1);
}

/// Record how a dispatched request was classified for its backend.
pub fn record_backend_outcome(backend: &BackendId, healthy: bool) {
    let class = if healthy { "healthy" } else { "unhealthy" };
    ::metrics::counter!(
        "proxy_backend_outcomes_total",
        "backend" => backend.to_string(),
        "class" => class
    )
    .increment(1);
}

pub fn record_circuit_state(backend: &BackendId, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    ::metrics::gauge!("proxy_circuit_state", "backend" => backend.to_string()).set(value);
}
