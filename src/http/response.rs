//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hand the backend response to the client: status, headers, body
//! - Count a completed copy as a response and a broken copy as an error
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - The copy is finished when the body reports its end, fails when the body
//!   errors or is dropped early (client went away, write failed)
//! - The outbound deadline covers the whole exchange: a body still streaming
//!   when it passes is cut off and counted as a failed copy
//! - A broken copy never touches circuit state: the backend already answered

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::response::Response;
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use tokio::time::{sleep_until, Instant, Sleep};

use crate::http::request::strip_hop_by_hop;
use crate::load_balancer::backend::BackendId;
use crate::observability::metrics::Counters;

/// Convert a backend response into the client response. The body must be
/// fully relayed before `deadline`.
pub fn relay(
    response: hyper::Response<Incoming>,
    backend: BackendId,
    counters: Arc<Counters>,
    deadline: Instant,
) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let body = CopyTrackedBody::new(Body::new(body), backend, counters, deadline);
    Response::from_parts(parts, Body::new(body))
}

/// Body wrapper that records how the copy to the client ended.
#[derive(Debug)]
pub struct CopyTrackedBody {
    inner: Body,
    backend: BackendId,
    counters: Arc<Counters>,
    deadline: Pin<Box<Sleep>>,
    finished: bool,
}

impl CopyTrackedBody {
    /// Must be called inside a Tokio runtime.
    pub fn new(inner: Body, backend: BackendId, counters: Arc<Counters>, deadline: Instant) -> Self {
        let mut body = Self {
            inner,
            backend,
            counters,
            deadline: Box::pin(sleep_until(deadline)),
            finished: false,
        };
        // Empty bodies (HEAD, 204, Content-Length: 0) may never be polled.
        if body.inner.is_end_stream() {
            body.complete();
        }
        body
    }

    fn complete(&mut self) {
        if !self.finished {
            self.finished = true;
            self.counters.inc_response();
        }
    }

    fn fail(&mut self, reason: &dyn std::fmt::Display) {
        if !self.finished {
            self.finished = true;
            self.counters.inc_error();
            tracing::error!(backend = %self.backend, error = %reason, "Error: Error copying response");
        }
    }
}

impl HttpBody for CopyTrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.finished && this.deadline.as_mut().poll(cx).is_ready() {
            let timed_out = io::Error::new(io::ErrorKind::TimedOut, "response body not relayed before deadline");
            this.fail(&timed_out);
            return Poll::Ready(Some(Err(axum::Error::new(timed_out))));
        }

        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.complete(),
            Poll::Ready(Some(Err(e))) => this.fail(e),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.complete(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CopyTrackedBody {
    fn drop(&mut self) {
        self.fail(&"response body dropped before completion");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Body that never yields a frame.
    struct Stalled;

    impl HttpBody for Stalled {
        type Data = Bytes;
        type Error = axum::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            Poll::Pending
        }
    }

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    async fn drain(body: CopyTrackedBody) -> Bytes {
        axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_completed_copy_counts_response() {
        let counters = Arc::new(Counters::new());
        let body = CopyTrackedBody::new(Body::from("hello"), BackendId::from("http://a"), counters.clone(), far());

        assert_eq!(drain(body).await, Bytes::from("hello"));
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.responses, 1);
        assert_eq!(snapshot.errors, 0);
    }

    #[tokio::test]
    async fn test_empty_body_counts_immediately() {
        let counters = Arc::new(Counters::new());
        let body = CopyTrackedBody::new(Body::empty(), BackendId::from("http://a"), counters.clone(), far());
        assert_eq!(counters.snapshot().responses, 1);

        drop(body);
        assert_eq!(counters.snapshot().responses, 1);
        assert_eq!(counters.snapshot().errors, 0);
    }

    #[tokio::test]
    async fn test_abandoned_copy_counts_error() {
        let counters = Arc::new(Counters::new());
        let body = CopyTrackedBody::new(Body::from("never read"), BackendId::from("http://a"), counters.clone(), far());

        drop(body);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.responses, 0);
        assert_eq!(snapshot.errors, 1);
    }

    #[tokio::test]
    async fn test_stalled_body_fails_at_deadline() {
        let counters = Arc::new(Counters::new());
        let deadline = Instant::now() + Duration::from_millis(50);
        let body = CopyTrackedBody::new(Body::new(Stalled), BackendId::from("http://a"), counters.clone(), deadline);

        let started = Instant::now();
        let drained = tokio::time::timeout(
            Duration::from_secs(5),
            axum::body::to_bytes(Body::new(body), usize::MAX),
        )
        .await
        .expect("deadline should end the copy");

        assert!(drained.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.responses, 0);
    }
}
