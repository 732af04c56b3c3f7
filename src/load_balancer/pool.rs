//! Backend pool.
//!
//! # Responsibilities
//! - Hold the configured backends in rotation order
//! - Own the rotation counter shared by every selection attempt

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::UpstreamConfig;
use crate::load_balancer::backend::BackendId;

/// Ordered, immutable set of backends plus a rotation counter.
#[derive(Debug, Default)]
pub struct BackendPool {
    backends: Box<[BackendId]>,
    rotation: AtomicUsize,
}

impl BackendPool {
    pub fn new(backends: Vec<BackendId>) -> Self {
        Self {
            backends: backends.into_boxed_slice(),
            rotation: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.backends.iter().map(|url| BackendId::from(url.as_str())).collect())
    }

    /// Advance the rotation counter by one and return the value it held.
    ///
    /// Every caller observes a distinct value; the counter wraps on overflow.
    pub fn advance(&self) -> usize {
        self.rotation.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of selection attempts made so far (modulo wrap-around).
    pub fn rotation(&self) -> usize {
        self.rotation.load(Ordering::Relaxed)
    }

    pub fn backends(&self) -> &[BackendId] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_keeps_order() {
        let config = UpstreamConfig {
            backends: vec!["http://b:1".into(), "http://a:2".into()],
            ..UpstreamConfig::default()
        };
        let pool = BackendPool::from_config(&config);

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.backends()[0].as_str(), "http://b:1");
        assert_eq!(pool.backends()[1].as_str(), "http://a:2");
    }

    #[test]
    fn test_advance_returns_previous_value() {
        let pool = BackendPool::new(vec![BackendId::from("http://a")]);
        assert_eq!(pool.advance(), 0);
        assert_eq!(pool.advance(), 1);
        assert_eq!(pool.rotation(), 2);
    }
}
