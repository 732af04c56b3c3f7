//! Command line interface.
//!
//! Flags override values loaded from `--config` (or the defaults when no
//! file is given). The merged result is validated once.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::loader::{load_config, validated, ConfigError};
use crate::config::schema::ProxyConfig;

#[derive(Debug, Parser)]
#[command(name = "dispatch-proxy")]
#[command(about = "Rate-limited, circuit-breaking round-robin HTTP proxy", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. ":3000" or "127.0.0.1:3000"
    #[arg(long)]
    pub listen: Option<String>,

    /// Deadline for reading a request head, e.g. "5s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub read_timeout: Option<Duration>,

    /// Deadline for the outbound call to a backend, e.g. "10s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub write_timeout: Option<Duration>,

    /// Admitted requests per second
    #[arg(long)]
    pub rate_limit: Option<u32>,

    /// Comma-separated backend URLs
    #[arg(long, value_delimiter = ',')]
    pub backends: Option<Vec<String>>,

    /// Consecutive failures that open a backend's circuit
    #[arg(long)]
    pub failure_threshold: Option<u32>,

    /// How long an open circuit waits before allowing a probe, e.g. "10s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub open_timeout: Option<Duration>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub prometheus: Option<String>,
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(timeout) = self.read_timeout {
            config.listener.read_timeout = timeout;
        }
        if let Some(timeout) = self.write_timeout {
            config.upstream.write_timeout = timeout;
        }
        if let Some(rps) = self.rate_limit {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(backends) = self.backends {
            config.upstream.backends = backends
                .into_iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
        }
        if let Some(threshold) = self.failure_threshold {
            config.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(timeout) = self.open_timeout {
            config.circuit_breaker.open_timeout = timeout;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(addr) = self.prometheus {
            config.observability.prometheus_address = Some(addr);
        }

        validated(config)
    }
}
