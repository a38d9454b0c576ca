//! Time abstraction shared by the capture, playback, and dialog paths.
//!
//! `Clock` exists so endpoint timing and idle-timeout logic can run under a
//! virtual clock in tests. `ActivityStamp` is the shared last-interaction
//! timestamp: many threads write it, none of them coordinate, and the only
//! guarantee needed is that it never moves backward.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for deterministic tests. `sleep` advances the clock
/// instead of blocking.
pub struct TestClock {
    current: Mutex<Instant>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        std::thread::yield_now();
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn real_clock() -> SharedClock {
    Arc::new(RealClock)
}

/// Monotonic last-interaction timestamp.
///
/// Stored as milliseconds since `origin` in an `AtomicU64` updated with
/// `fetch_max`, so concurrent writers (capture loop, playback thread) can
/// only move it forward or leave it in place. No lock, no ordering beyond
/// the max-write.
pub struct ActivityStamp {
    origin: Instant,
    elapsed_ms: AtomicU64,
}

impl ActivityStamp {
    pub fn new(origin: Instant) -> Self {
        Self {
            origin,
            elapsed_ms: AtomicU64::new(0),
        }
    }

    /// Record activity at `now`. Writes strictly in the past are ignored.
    pub fn touch(&self, now: Instant) {
        let ms = now.saturating_duration_since(self.origin).as_millis() as u64;
        self.elapsed_ms.fetch_max(ms, Ordering::AcqRel);
    }

    /// Time elapsed since the most recent recorded activity.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let last = Duration::from_millis(self.elapsed_ms.load(Ordering::Acquire));
        now.saturating_duration_since(self.origin).saturating_sub(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_stamp_never_moves_backward() {
        let origin = Instant::now();
        let stamp = ActivityStamp::new(origin);

        stamp.touch(origin + Duration::from_secs(10));
        stamp.touch(origin + Duration::from_secs(5));

        let idle = stamp.idle_for(origin + Duration::from_secs(12));
        assert_eq!(idle, Duration::from_secs(2));
    }

    #[test]
    fn idle_for_counts_from_last_touch() {
        let origin = Instant::now();
        let stamp = ActivityStamp::new(origin);

        assert_eq!(
            stamp.idle_for(origin + Duration::from_secs(7)),
            Duration::from_secs(7)
        );

        stamp.touch(origin + Duration::from_secs(4));
        assert_eq!(
            stamp.idle_for(origin + Duration::from_secs(7)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_clock_sleep_advances() {
        let clock = TestClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now() - before, Duration::from_millis(250));
    }
}
