//! Time sources for sampling and event metadata
//!
//! The capture loop schedules against `micros()`, a monotonic microsecond
//! counter. Event timestamps come from `now_utc()`. Both are behind one trait
//! so tests can drive time by hand.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic + wall-clock time source
pub trait Clock: Send {
    /// Microseconds since an arbitrary fixed origin, never decreasing
    fn micros(&self) -> u64;

    /// Current wall-clock time
    fn now_utc(&self) -> DateTime<Utc>;

    /// Block the calling thread for roughly `us` microseconds
    fn delay_us(&self, us: u64);
}

/// Clock backed by `Instant` and the system wall clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn delay_us(&self, us: u64) {
        if us > 0 {
            std::thread::sleep(Duration::from_micros(us));
        }
    }
}

/// Manually driven clock
///
/// Every `micros()` read advances time by `tick_us`, so a spin-wait against
/// it always terminates. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
    tick_us: u64,
    epoch: DateTime<Utc>,
}

impl ManualClock {
    pub fn new(tick_us: u64) -> Self {
        Self {
            now_us: Arc::new(AtomicU64::new(0)),
            tick_us,
            epoch: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        }
    }

    /// Current time without advancing
    pub fn peek(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }

    pub fn advance(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn micros(&self) -> u64 {
        self.now_us.fetch_add(self.tick_us, Ordering::SeqCst)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.epoch + chrono::Duration::microseconds(self.peek() as i64)
    }

    fn delay_us(&self, us: u64) {
        self.advance(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_ticks_on_read() {
        let clock = ManualClock::new(5);
        assert_eq!(clock.micros(), 0);
        assert_eq!(clock.micros(), 5);
        assert_eq!(clock.peek(), 10);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let other = clock.clone();
        other.delay_us(1_000);
        assert_eq!(clock.peek(), 1_000);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.micros();
        let b = clock.micros();
        assert!(b >= a);
    }
}
