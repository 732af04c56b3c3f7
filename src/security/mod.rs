//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (global sliding-window admission)
//!     → Pass to dispatch
//! ```
//!
//! # Design Decisions
//! - One limit for the whole proxy, not per client
//! - Fail closed: a denied request never reaches a backend

pub mod rate_limit;

pub use rate_limit::SlidingWindowLimiter;
