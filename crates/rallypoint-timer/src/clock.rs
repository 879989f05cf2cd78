//! Millisecond wall clocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Source of "now" as Unix epoch milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

/// Epoch time anchored once at construction and advanced by Tokio's
/// monotonic clock.
///
/// Anchoring keeps the value monotonic even if the system clock is
/// stepped, and it follows `tokio::time::pause()`/`advance()` in tests.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch_at_anchor: u64,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch = chrono::Utc::now().timestamp_millis();
        Self {
            epoch_at_anchor: u64::try_from(epoch).unwrap_or(0),
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let elapsed = u64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.epoch_at_anchor.saturating_add(elapsed)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now.fetch_add(by, Ordering::SeqCst);
    }

    /// Moves the clock to `millis`. Never moves it backwards.
    pub fn set(&self, millis: u64) {
        self.now.fetch_max(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance_and_share() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(Duration::from_millis(250));
        assert_eq!(other.now_millis(), 1_250);
    }

    #[test]
    fn test_manual_clock_set_never_goes_backwards() {
        let clock = ManualClock::new(5_000);
        clock.set(4_000);
        assert_eq!(clock.now_millis(), 5_000);
        clock.set(6_000);
        assert_eq!(clock.now_millis(), 6_000);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock::new().now_millis() > 1_577_836_800_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_follows_paused_tokio_time() {
        let clock = SystemClock::new();
        let before = clock.now_millis();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(clock.now_millis() - before, 3_000);
    }
}
