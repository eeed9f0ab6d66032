//! Wall-clock helpers.
//!
//! All timestamps in this crate are milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Source of the current time, injected into services so tests can pin it.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u128;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u128 {
        now_ms()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<u128>,
}

impl ManualClock {
    /// Create a clock pinned at `start_ms`.
    #[must_use]
    pub const fn new(start_ms: u128) -> Self {
        Self {
            now: Mutex::new(start_ms),
        }
    }

    /// Move the clock forward.
    pub fn advance_ms(&self, delta: u128) {
        *self.now.lock() += delta;
    }

    /// Pin the clock to an absolute time.
    pub fn set_ms(&self, at: u128) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u128 {
        *self.now.lock()
    }
}
