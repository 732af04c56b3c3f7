//! Admission control: sliding-window rate limiting.
//!
//! One process-wide window of admission timestamps. A request is admitted
//! when fewer than `requests_per_second` admissions happened in the trailing
//! second. Denied requests get a 429 before any backend is selected.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::http::dispatch::DispatchOutcome;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

const WINDOW: Duration = Duration::from_secs(1);

/// Sliding one-second window limiter.
#[derive(Debug)]
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    /// Admission times, oldest first.
    window: Mutex<VecDeque<Instant>>,
    limit: usize,
    clock: C,
}

impl SlidingWindowLimiter<SystemClock> {
    pub fn new(requests_per_second: u32) -> Self {
        Self::with_clock(requests_per_second, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    pub fn with_clock(requests_per_second: u32, clock: C) -> Self {
        let limit = requests_per_second as usize;
        Self {
            window: Mutex::new(VecDeque::with_capacity(limit)),
            limit,
            clock,
        }
    }

    /// Decide whether one more request fits in the trailing second.
    ///
    /// Time is read after the lock is taken, so the window stays ordered and
    /// simultaneous callers are decided in lock order.
    pub fn allow(&self) -> bool {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();

        while let Some(&oldest) = window.front() {
            if now.saturating_duration_since(oldest) < WINDOW {
                break;
            }
            window.pop_front();
        }

        if window.len() < self.limit {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Admission stage: rejects with 429 when the window is full.
pub async fn admission_middleware(
    State(limiter): State<Arc<SlidingWindowLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.allow() {
        return next.run(request).await;
    }

    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        limit = limiter.limit(),
        "Rate limit exceeded"
    );
    metrics::record_rate_limited();

    let error = ProxyError::CapacityExceeded;
    let outcome = DispatchOutcome::from_error(&error);
    let mut response = error.into_response();
    response.extensions_mut().insert(outcome);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::dispatch::OutcomeKind;
    use crate::resilience::clock::ManualClock;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_limit_within_one_window() {
        let clock = ManualClock::new();
        let limiter = SlidingWindowLimiter::with_clock(2, clock.clone());

        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        clock.advance(Duration::from_millis(1001));
        assert!(limiter.allow());
    }

    #[test]
    fn test_window_slides_rather_than_resets() {
        let clock = ManualClock::new();
        let limiter = SlidingWindowLimiter::with_clock(2, clock.clone());

        assert!(limiter.allow());
        clock.advance(Duration::from_millis(600));
        assert!(limiter.allow());

        // First admission is now exactly one second old and leaves the window.
        clock.advance(Duration::from_millis(400));
        assert!(limiter.allow());

        // The 600ms and 1000ms admissions are both still inside.
        clock.advance(Duration::from_millis(100));
        assert!(!limiter.allow());
    }

    #[test]
    fn test_denied_requests_do_not_consume_capacity() {
        let clock = ManualClock::new();
        let limiter = SlidingWindowLimiter::with_clock(1, clock.clone());

        assert!(limiter.allow());
        for _ in 0..10 {
            clock.advance(Duration::from_millis(50));
            assert!(!limiter.allow());
        }
        clock.advance(Duration::from_millis(500));
        assert!(limiter.allow());
    }

    #[test]
    fn test_zero_limit_admits_nothing() {
        let limiter = SlidingWindowLimiter::with_clock(0, ManualClock::new());
        assert!(!limiter.allow());
    }

    #[test]
    fn test_concurrent_burst_never_exceeds_limit() {
        let limiter = Arc::new(SlidingWindowLimiter::with_clock(50, ManualClock::new()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..100).filter(|_| limiter.allow()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 50);
    }

    #[test]
    fn test_real_clock_recovers_after_a_second() {
        let limiter = SlidingWindowLimiter::new(2);

        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        std::thread::sleep(Duration::from_millis(1100));
        assert!(limiter.allow());
    }

    #[tokio::test]
    async fn test_denied_request_carries_outcome() {
        let limiter = Arc::new(SlidingWindowLimiter::new(1));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, admission_middleware));
        let get_root = || Request::builder().uri("/").body(Body::empty()).unwrap();

        let admitted = app.clone().oneshot(get_root()).await.unwrap();
        assert_eq!(admitted.status(), StatusCode::OK);
        assert!(admitted.extensions().get::<DispatchOutcome>().is_none());

        let denied = app.oneshot(get_root()).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        let outcome = denied.extensions().get::<DispatchOutcome>().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::CapacityExceeded);
        assert_eq!(outcome.backend, None);
    }
}
