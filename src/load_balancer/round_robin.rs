//! Round-robin load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::BackendId, pool::BackendPool, LoadBalancer};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::clock::{Clock, SystemClock};

/// Round-robin selector that skips backends with an open circuit.
#[derive(Debug)]
pub struct RoundRobin<C: Clock = SystemClock> {
    pool: BackendPool,
    health: Arc<CircuitBreaker<C>>,
}

impl<C: Clock> RoundRobin<C> {
    pub fn new(pool: BackendPool, health: Arc<CircuitBreaker<C>>) -> Self {
        Self { pool, health }
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }
}

impl<C: Clock> LoadBalancer for RoundRobin<C> {
    fn next_server(&self) -> Option<BackendId> {
        if self.pool.is_empty() {
            return None;
        }

        let start = self.pool.advance();
        let backends = self.pool.backends();
        let len = backends.len();

        for i in 0..len {
            let backend = &backends[start.wrapping_add(i) % len];
            if self.health.is_available(backend) {
                return Some(backend.clone());
            }
        }

        tracing::debug!(backend_count = len, "No available backends in pool");
        None
    }

    fn backends(&self) -> &[BackendId] {
        self.pool.backends()
    }
}
