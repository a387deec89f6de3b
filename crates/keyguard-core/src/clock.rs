//! Wall-clock source for lockout windows

use std::cell::Cell;
use std::rc::Rc;

/// Source of Unix timestamps in seconds
pub trait Clock {
    fn now(&self) -> u64;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Manually advanced clock
///
/// Clones share the same time, so a test can keep a handle while the state
/// machine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.set(self.now.get().saturating_add(secs));
    }

    pub fn set(&self, now: u64) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.get()
    }
}
