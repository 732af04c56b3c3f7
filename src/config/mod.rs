//! Configuration subsystem.
//!
//! ```text
//! optional TOML file ─▶ loader.rs ─┐
//! defaults ────────────────────────┼─▶ cli.rs overrides ─▶ validation.rs ─▶ ProxyConfig
//! ```
//!
//! Every field has a default, so an empty file (or no file) is a working
//! configuration. The result is read once at startup and never changes.

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    CircuitBreakerConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, RateLimitConfig, UpstreamConfig,
};
