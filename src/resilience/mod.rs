//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → load balancer asks circuit_breaker.rs whether each candidate is available
//!     → dispatcher forwards with the outbound deadline
//!     → outcome reported back to circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline
//! - No retries: one attempt per inbound request
//! - Circuit breaker prevents cascading failures
//! - Time comes from a [`clock::Clock`] so transitions are testable

pub mod circuit_breaker;
pub mod clock;

pub use circuit_breaker::{BackendHealth, CircuitBreaker, CircuitState};
