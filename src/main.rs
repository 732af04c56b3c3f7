//! Dispatch proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ──▶ request id ──▶ observe ──▶ classify ──▶ admission
//!                                                                                  │
//!                                                                                  ▼
//!                      ┌──────────────┐   next_server   ┌──────────────┐     ┌──────────┐
//!                      │ round robin  │◀────────────────│  dispatcher  │◀────│  429 or  │
//!                      │ + pool       │                 │              │     │  pass    │
//!                      └──────┬───────┘                 └──────┬───────┘     └──────────┘
//!                             │ is_available                   │ report_success / report_failure
//!                             ▼                                ▼
//!                      ┌──────────────────────────────────────────────┐
//!                      │        circuit breaker (per backend)         │
//!                      └──────────────────────────────────────────────┘
//! ```

use clap::Parser;

use dispatch_proxy::config::cli::Cli;
use dispatch_proxy::lifecycle::startup;
use dispatch_proxy::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.upstream.backends.len(),
        rate_limit = config.rate_limit.requests_per_second,
        failure_threshold = config.circuit_breaker.failure_threshold,
        "dispatch-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
