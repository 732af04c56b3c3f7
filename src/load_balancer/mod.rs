//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher needs a backend
//!     → LoadBalancer::next_server
//!     → pool.rs (advance rotation counter)
//!     → round_robin.rs (scan from rotated offset)
//!     → CircuitBreaker::is_available per candidate
//!     → first available backend, or None on total outage
//! ```
//!
//! # Design Decisions
//! - The pool is fixed at startup; only its rotation counter mutates
//! - The counter advances on every attempt, found or not, so skipping open
//!   backends does not pile load onto the first healthy entry
//! - Health lives in the circuit breaker; the balancer only asks

pub mod backend;
pub mod pool;
pub mod round_robin;

use std::fmt::Debug;

use crate::load_balancer::backend::BackendId;

/// Backend selection strategy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Pick the next backend, or `None` when no backend can take traffic.
    fn next_server(&self) -> Option<BackendId>;

    /// Every backend this balancer selects from, in configured order.
    fn backends(&self) -> &[BackendId];
}
