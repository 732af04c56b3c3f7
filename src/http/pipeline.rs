//! Request pipeline.
//!
//! # Stage Order
//! ```text
//! request id ─▶ observe ─▶ classify ─▶ admission ─▶ dispatch
//!            ◀─          ◀─          ◀─           ◀─ (response + DispatchOutcome)
//! ```
//! Stages are listed outermost first: the first stage sees the request first
//! and the response last. Any stage may answer on its own without calling the
//! next one (admission does, with 429).
//!
//! # Design Decisions
//! - The dispatcher is the only place that rejects for health reasons and the
//!   only place that reports to the circuit breaker. `classify` reads the
//!   [`DispatchOutcome`] after the fact and never rejects up front, so a
//!   request cannot be counted against a backend twice
//! - `/health` and `/metrics` are not part of this router

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::any,
    Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::dispatch::{dispatch_handler, DispatchOutcome, Dispatcher};
use crate::observability::metrics;
use crate::security::rate_limit::{admission_middleware, SlidingWindowLimiter};

/// Build the proxy router: every path and method goes through the stages
/// into the dispatcher.
pub fn proxy_router(dispatcher: Arc<Dispatcher>, limiter: Arc<SlidingWindowLimiter>) -> Router {
    let stages = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(middleware::from_fn(observe))
        .layer(middleware::from_fn(classify))
        .layer(middleware::from_fn_with_state(limiter, admission_middleware));

    Router::new()
        .route("/", any(dispatch_handler))
        .route("/{*path}", any(dispatch_handler))
        .with_state(dispatcher)
        .layer(stages)
}

/// Observability stage: one log line per request.
pub async fn observe(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(request).await;

    let status = response.status();
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration = ?start.elapsed(),
        "Request completed"
    );
    metrics::record_request(method.as_str(), status.as_u16(), start);

    response
}

/// Health classification stage.
///
/// A 5xx attributed to a selected backend is classified unhealthy, anything
/// else healthy. Requests that never reached a backend are not classified.
pub async fn classify(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;

    let Some(outcome) = response.extensions().get::<DispatchOutcome>() else {
        return response;
    };
    let Some(backend) = outcome.backend.as_ref() else {
        return response;
    };

    let healthy = !outcome.status.is_server_error();
    if !healthy {
        tracing::warn!(
            backend = %backend,
            status = outcome.status.as_u16(),
            kind = ?outcome.kind,
            "Backend outcome classified unhealthy"
        );
    }
    metrics::record_backend_outcome(backend, healthy);

    response
}
