//! Dispatch proxy library.
//!
//! A single-purpose HTTP proxy: a global sliding-window rate limit in front
//! of a round-robin pool of backends, each guarded by its own circuit breaker.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
