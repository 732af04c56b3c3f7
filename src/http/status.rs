//! Status endpoints served beside the proxy: `/health` and `/metrics`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::observability::metrics::{CounterSnapshot, Counters};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};

/// State shared by the status handlers.
#[derive(Debug, Clone)]
pub struct StatusState {
    pub counters: Arc<Counters>,
    pub health: Arc<CircuitBreaker>,
    pub started_at: Instant,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime: String,
    pub backends: Vec<BackendReport>,
}

#[derive(Debug, Serialize)]
pub struct BackendReport {
    pub backend: String,
    pub circuit: CircuitState,
}

pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(counters))
        .with_state(state)
}

async fn health(State(state): State<StatusState>) -> Json<HealthReport> {
    let elapsed = state.started_at.elapsed();
    let uptime = Duration::from_millis(elapsed.as_millis() as u64);

    Json(HealthReport {
        status: "UP",
        uptime: humantime::format_duration(uptime).to_string(),
        backends: state
            .health
            .states()
            .into_iter()
            .map(|(backend, circuit)| BackendReport {
                backend: backend.to_string(),
                circuit,
            })
            .collect(),
    })
}

async fn counters(State(state): State<StatusState>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}
