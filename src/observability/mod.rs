//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → pipeline observe stage (method, path, status, duration)
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (atomic counters + Prometheus facade)
//!
//! Consumers:
//!     → stdout log lines
//!     → GET /metrics (counter snapshot as JSON)
//!     → optional Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
