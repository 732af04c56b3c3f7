//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check backend URLs are absolute `http` URLs and not repeated
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - An empty backend list is valid: the proxy runs and answers 503

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::config::schema::ProxyConfig;
use crate::net::listener::resolve_bind_address;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if resolve_bind_address(&config.listener.bind_address).is_none() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    check_timeout(&mut errors, "listener.read_timeout", config.listener.read_timeout);
    check_timeout(&mut errors, "upstream.write_timeout", config.upstream.write_timeout);
    check_timeout(&mut errors, "circuit_breaker.open_timeout", config.circuit_breaker.open_timeout);

    if config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::new("rate_limit.requests_per_second", "must be greater than 0"));
    }
    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for (i, backend) in config.upstream.backends.iter().enumerate() {
        let field = format!("upstream.backends[{}]", i);
        match Url::parse(backend) {
            Ok(url) if url.scheme() != "http" => {
                errors.push(ValidationError::new(field, format!("unsupported scheme {:?}", url.scheme())));
            }
            Ok(url) if url.host_str().is_none() => {
                errors.push(ValidationError::new(field, "missing host"));
            }
            Ok(_) => {
                if !seen.insert(backend.trim_end_matches('/')) {
                    errors.push(ValidationError::new(field, format!("duplicate backend {}", backend)));
                }
            }
            Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_timeout(errors: &mut Vec<ValidationError>, field: &str, value: Duration) {
    if value.is_zero() {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_empty_backends_is_valid() {
        let mut config = ProxyConfig::default();
        config.upstream.backends.clear();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.rate_limit.requests_per_second = 0;
        config.circuit_breaker.failure_threshold = 0;
        config.upstream.write_timeout = Duration::ZERO;
        config.upstream.backends = vec![
            "http://a:1".into(),
            "http://a:1/".into(),
            "https://b:2".into(),
            "nonsense".into(),
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "upstream.write_timeout",
                "rate_limit.requests_per_second",
                "circuit_breaker.failure_threshold",
                "upstream.backends[1]",
                "upstream.backends[2]",
                "upstream.backends[3]",
            ]
        );
    }

    #[test]
    fn test_bare_port_bind_address() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = ":3000".into();
        assert!(validate_config(&config).is_ok());
    }
}
