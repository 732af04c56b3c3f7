//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, skipped by selection
//! - Half-Open: timeout elapsed, backend may be probed again
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: availability check after open_timeout since last failure
//! Half-Open → Closed: next reported success
//! Half-Open → Open: next reported failure
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global), records created on first reference
//! - No background timers: Open → Half-Open is evaluated inside [`CircuitBreaker::is_available`],
//!   so an idle open backend stays open until something asks about it
//! - Any success zeroes the failure count; only a Half-Open success changes state

use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::load_balancer::backend::BackendId;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

/// Circuit state of a single backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

/// Failure bookkeeping for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendHealth {
    pub state: CircuitState,
    /// Failures since the last success. Not capped.
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

/// What a read-locked look at a record decided.
enum Probe {
    Available,
    Unavailable,
    NeedsWrite,
}

/// Per-backend circuit breaker.
///
/// Records live in a sharded map: availability checks take a shared read
/// guard and only upgrade to an exclusive guard when a record has to be
/// created or an open circuit's timeout has run out.
#[derive(Debug)]
pub struct CircuitBreaker<C: Clock = SystemClock> {
    records: DashMap<BackendId, BackendHealth>,
    config: CircuitBreakerConfig,
    clock: C,
}

impl CircuitBreaker<SystemClock> {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> Self {
        Self {
            records: DashMap::new(),
            config,
            clock,
        }
    }

    /// Record a failed request to `backend`.
    pub fn report_failure(&self, backend: &BackendId) {
        let now = self.clock.now();
        let mut record = self.records.entry(backend.clone()).or_default();

        record.failure_count = record.failure_count.saturating_add(1);
        record.last_failure = Some(now);

        if record.failure_count >= self.config.failure_threshold && record.state != CircuitState::Open {
            let previous = record.state;
            record.state = CircuitState::Open;
            tracing::warn!(
                backend = %backend,
                failures = record.failure_count,
                from = ?previous,
                "Circuit opened"
            );
            metrics::record_circuit_state(backend, CircuitState::Open);
        }
    }

    /// Record a successful request to `backend`.
    pub fn report_success(&self, backend: &BackendId) {
        let mut record = self.records.entry(backend.clone()).or_default();
        record.failure_count = 0;

        if record.state == CircuitState::HalfOpen {
            record.state = CircuitState::Closed;
            tracing::info!(backend = %backend, "Circuit closed after successful probe");
            metrics::record_circuit_state(backend, CircuitState::Closed);
        }
    }

    /// Whether `backend` may receive traffic (its circuit is not open).
    ///
    /// Not a pure read: when an open circuit's timeout has elapsed this call
    /// moves it to Half-Open and reports it available. Unknown backends get a
    /// fresh Closed record.
    pub fn is_available(&self, backend: &BackendId) -> bool {
        let now = self.clock.now();

        let probe = match self.records.get(backend) {
            None => Probe::NeedsWrite,
            Some(record) if record.state != CircuitState::Open => Probe::Available,
            Some(record) if self.timeout_elapsed(&record, now) => Probe::NeedsWrite,
            Some(_) => Probe::Unavailable,
        };

        match probe {
            Probe::Available => true,
            Probe::Unavailable => false,
            Probe::NeedsWrite => self.transition_if_due(backend, now),
        }
    }

    /// Exclusive half of [`Self::is_available`]. The record is re-read because
    /// another caller may have changed it between the two guards.
    fn transition_if_due(&self, backend: &BackendId, now: Instant) -> bool {
        let mut record = self.records.entry(backend.clone()).or_default();
        if record.state != CircuitState::Open {
            return true;
        }
        if !self.timeout_elapsed(&record, now) {
            return false;
        }

        record.state = CircuitState::HalfOpen;
        tracing::info!(
            backend = %backend,
            timeout = ?self.config.open_timeout,
            "Circuit half-open, allowing probe"
        );
        metrics::record_circuit_state(backend, CircuitState::HalfOpen);
        true
    }

    fn timeout_elapsed(&self, record: &BackendHealth, now: Instant) -> bool {
        record
            .last_failure
            .map_or(true, |at| now.saturating_duration_since(at) > self.config.open_timeout)
    }

    /// Copy of the current record for `backend`, if one exists.
    pub fn snapshot(&self, backend: &BackendId) -> Option<BackendHealth> {
        self.records.get(backend).map(|record| *record)
    }

    /// Current state of every known backend, ordered by identity.
    pub fn states(&self) -> Vec<(BackendId, CircuitState)> {
        let mut states: Vec<_> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
