//! Wall-clock abstraction used for cache expiry and observation timestamps.

use std::sync::Mutex;
use std::time::Duration;

use crate::UtcDateTime;

/// Source of the current UTC time.
///
/// Production code uses [`SystemClock`]; tests inject a [`ManualClock`] to
/// place lookups exactly on either side of an expiry instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> UtcDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<UtcDateTime>,
}

impl ManualClock {
    pub fn new(start: UtcDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, value: UtcDateTime) {
        *self.now.lock().expect("manual clock lock is not poisoned") = value;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("manual clock lock is not poisoned");
        *now = now.saturating_add(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UtcDateTime {
        *self.now.lock().expect("manual clock lock is not poisoned")
    }
}
