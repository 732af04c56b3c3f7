//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//! Durations are written as humantime strings (`"5s"`, `"250ms"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the dispatch proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limits, read timeout).
    pub listener: ListenerConfig,

    /// Backend pool and outbound call settings.
    pub upstream: UpstreamConfig,

    /// Admission control.
    pub rate_limit: RateLimitConfig,

    /// Per-backend circuit breaking.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000"). A bare ":3000" binds all interfaces.
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Deadline for reading the request head from a client.
    #[serde(with = "humantime_duration")]
    pub read_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_connections: 10_000,
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Backend pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend base URLs, in rotation order.
    pub backends: Vec<String>,

    /// Deadline for the outbound call to a backend.
    #[serde(with = "humantime_duration")]
    pub write_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            backends: vec!["http://localhost:8080".to_string()],
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum admitted requests in any trailing one-second window.
    pub requests_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 100,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures that open the circuit for a backend.
    pub failure_threshold: u32,

    /// Time an open circuit waits after the last failure before allowing a probe.
    #[serde(with = "humantime_duration")]
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(10),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Prometheus scrape endpoint bind address. Disabled when unset.
    pub prometheus_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            prometheus_address: None,
        }
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
