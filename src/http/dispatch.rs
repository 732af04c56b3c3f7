//! Terminal dispatch stage.
//!
//! # Responsibilities
//! - Select a backend through the load balancer
//! - Forward the request with the outbound deadline, which also bounds the
//!   relayed response body
//! - Report the backend's answer (or silence) to the circuit breaker
//! - Attach a [`DispatchOutcome`] for the outer pipeline stages
//!
//! # Design Decisions
//! - One attempt per inbound request: no retries, no failover
//! - Only a failed attempt on a chosen backend is a health failure; an empty
//!   selection or a URI that cannot be built says nothing about any backend
//! - Counters: received on entry, error on every failure path, response when
//!   the body copy completes (see `response.rs`)

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::{timeout_at, Instant};

use crate::error::ProxyError;
use crate::http::{request::build_outbound, response::relay};
use crate::load_balancer::{backend::BackendId, LoadBalancer};
use crate::observability::metrics::Counters;
use crate::resilience::circuit_breaker::CircuitBreaker;

/// How the terminal stage finished a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The backend answered; its response is being streamed back.
    Forwarded,
    /// Turned away by admission before reaching the dispatcher.
    CapacityExceeded,
    NoBackendAvailable,
    RequestBuild,
    UpstreamUnreachable,
}

/// How a request finished, carried in the response extensions. Set by the
/// dispatcher, or by the admission stage when it answers on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Backend the request was sent to, if one was selected.
    pub backend: Option<BackendId>,
    pub status: StatusCode,
    pub kind: OutcomeKind,
}

impl DispatchOutcome {
    pub fn from_error(error: &ProxyError) -> Self {
        let kind = match error {
            ProxyError::CapacityExceeded => OutcomeKind::CapacityExceeded,
            ProxyError::NoBackendAvailable => OutcomeKind::NoBackendAvailable,
            ProxyError::RequestBuild { .. } => OutcomeKind::RequestBuild,
            ProxyError::UpstreamUnreachable { .. } => OutcomeKind::UpstreamUnreachable,
        };
        Self {
            backend: error.backend().cloned(),
            status: error.status(),
            kind,
        }
    }
}

/// Forwards requests to backends chosen by a [`LoadBalancer`].
#[derive(Debug)]
pub struct Dispatcher {
    balancer: Arc<dyn LoadBalancer>,
    health: Arc<CircuitBreaker>,
    counters: Arc<Counters>,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        balancer: Arc<dyn LoadBalancer>,
        health: Arc<CircuitBreaker>,
        counters: Arc<Counters>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            balancer,
            health,
            counters,
            client,
            timeout,
        }
    }

    /// Run one request through selection and forwarding.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        self.counters.inc_request();

        let (mut response, outcome) = match self.forward(request).await {
            Ok((backend, response)) => {
                let outcome = DispatchOutcome {
                    backend: Some(backend),
                    status: response.status(),
                    kind: OutcomeKind::Forwarded,
                };
                (response, outcome)
            }
            Err(error) => {
                self.counters.inc_error();
                let outcome = DispatchOutcome::from_error(&error);
                (error.into_response(), outcome)
            }
        };

        response.extensions_mut().insert(outcome);
        response
    }

    async fn forward(&self, request: Request<Body>) -> Result<(BackendId, Response), ProxyError> {
        let backend = self
            .balancer
            .next_server()
            .ok_or(ProxyError::NoBackendAvailable)?;

        let outbound = build_outbound(&backend, request).map_err(|source| ProxyError::RequestBuild {
            backend: backend.clone(),
            source,
        })?;

        tracing::debug!(backend = %backend, uri = %outbound.uri(), "Forwarding request");

        let deadline = Instant::now() + self.timeout;
        let upstream = match timeout_at(deadline, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.health.report_failure(&backend);
                return Err(ProxyError::UpstreamUnreachable {
                    backend,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                self.health.report_failure(&backend);
                return Err(ProxyError::UpstreamUnreachable {
                    backend,
                    reason: format!("no response within {:?}", self.timeout),
                });
            }
        };

        self.health.report_success(&backend);
        let response = relay(upstream, backend.clone(), self.counters.clone(), deadline);
        Ok((backend, response))
    }
}

/// Axum handler for the terminal stage.
pub async fn dispatch_handler(State(dispatcher): State<Arc<Dispatcher>>, request: Request<Body>) -> Response {
    dispatcher.dispatch(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::load_balancer::{pool::BackendPool, round_robin::RoundRobin};

    fn dispatcher(backends: &[&str], threshold: u32) -> (Dispatcher, Arc<CircuitBreaker>, Arc<Counters>) {
        let health = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            open_timeout: Duration::from_secs(10),
        }));
        let pool = BackendPool::new(backends.iter().map(|b| BackendId::from(*b)).collect());
        let balancer: Arc<dyn LoadBalancer> = Arc::new(RoundRobin::new(pool, health.clone()));
        let counters = Arc::new(Counters::new());
        let dispatcher = Dispatcher::new(balancer, health.clone(), counters.clone(), Duration::from_secs(2));
        (dispatcher, health, counters)
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_pool_is_unavailable() {
        let (dispatcher, health, counters) = dispatcher(&[], 5);

        let response = dispatcher.dispatch(get("/")).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let outcome = response.extensions().get::<DispatchOutcome>().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::NoBackendAvailable);
        assert_eq!(outcome.backend, None);
        assert!(health.states().is_empty());

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.responses, 0);
    }

    #[tokio::test]
    async fn test_unreachable_backend_reports_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}", port);
        let (dispatcher, health, counters) = dispatcher(&[url.as_str()], 5);
        let backend = BackendId::from(url.as_str());

        let response = dispatcher.dispatch(get("/x")).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let outcome = response.extensions().get::<DispatchOutcome>().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::UpstreamUnreachable);
        assert_eq!(outcome.backend.as_ref(), Some(&backend));
        assert_eq!(health.snapshot(&backend).unwrap().failure_count, 1);
        assert_eq!(counters.snapshot().errors, 1);
    }

    #[tokio::test]
    async fn test_bad_backend_url_is_not_a_health_failure() {
        let (dispatcher, health, counters) = dispatcher(&["not a url"], 5);
        let backend = BackendId::from("not a url");

        let response = dispatcher.dispatch(get("/")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.extensions().get::<DispatchOutcome>().unwrap().kind,
            OutcomeKind::RequestBuild
        );
        assert_eq!(health.snapshot(&backend).unwrap().failure_count, 0);
        assert_eq!(counters.snapshot().errors, 1);
    }
}
