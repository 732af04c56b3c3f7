//! Time source for the time-driven state machines.
//!
//! The circuit breaker and the admission window both make decisions from
//! elapsed time. Reading time through [`Clock`] lets tests step time forward
//! without sleeping.

use std::fmt::Debug;
use std::time::Instant;

/// Source of monotonic time.
pub trait Clock: Send + Sync + Debug + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::Clock;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    /// Clock that only moves when told to. Clones share the same time.
    #[derive(Debug, Clone)]
    pub(crate) struct ManualClock {
        now: Arc<Mutex<Instant>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }
}
