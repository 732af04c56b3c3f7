//! Request-level error taxonomy.
//!
//! Every variant is terminal for the request that produced it: it is logged,
//! turned into exactly one plain-text response, and never retried.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::load_balancer::backend::BackendId;

/// Errors that end a proxied request early.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Admission denied by the rate limiter.
    #[error("Rate limit exceeded")]
    CapacityExceeded,

    /// Every backend is open, or the pool is empty.
    #[error("No backends available")]
    NoBackendAvailable,

    /// The outbound URI could not be built for the selected backend.
    #[error("Error creating proxy request")]
    RequestBuild {
        backend: BackendId,
        #[source]
        source: axum::http::Error,
    },

    /// The backend could not be reached or did not answer in time.
    #[error("Error forwarding request")]
    UpstreamUnreachable {
        backend: BackendId,
        reason: String,
    },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::NoBackendAvailable => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::RequestBuild { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Backend the failed request was aimed at, when one had been chosen.
    pub fn backend(&self) -> Option<&BackendId> {
        match self {
            ProxyError::RequestBuild { backend, .. }
            | ProxyError::UpstreamUnreachable { backend, .. } => Some(backend),
            _ => None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ProxyError::CapacityExceeded => {}
            ProxyError::NoBackendAvailable => {
                tracing::error!(status = status.as_u16(), "Error: {}", self);
            }
            ProxyError::RequestBuild { backend, source } => {
                tracing::error!(status = status.as_u16(), backend = %backend, error = %source, "Error: {}", self);
            }
            ProxyError::UpstreamUnreachable { backend, reason } => {
                tracing::error!(status = status.as_u16(), backend = %backend, reason = %reason, "Error: {}", self);
            }
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let backend = BackendId::from("http://a");
        assert_eq!(ProxyError::CapacityExceeded.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ProxyError::NoBackendAvailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        let unreachable = ProxyError::UpstreamUnreachable {
            backend: backend.clone(),
            reason: "connection refused".into(),
        };
        assert_eq!(unreachable.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(unreachable.backend(), Some(&backend));
        assert_eq!(ProxyError::NoBackendAvailable.backend(), None);
    }

    #[test]
    fn test_response_carries_message() {
        let response = ProxyError::NoBackendAvailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
