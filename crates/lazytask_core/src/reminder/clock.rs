//! Time sources for reminder evaluation.
//!
//! # Responsibility
//! - Abstract "current time" so passes can be replayed deterministically.
//! - Keep wall-clock time and tokio's timer in lockstep for the runtime loop.
//!
//! # Invariants
//! - `now_ms` is Unix epoch milliseconds.
//! - `TokioClock` advances exactly as far as tokio time does, including
//!   under a paused test runtime.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of "now" for due-state classification.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for synchronous tests and replays.
///
/// Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(duration_to_ms(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Wall clock derived from `tokio::time::Instant`.
///
/// Anchors an epoch timestamp to a tokio instant at construction and adds
/// tokio-elapsed time on every read, so interval ticks and classification
/// agree even when tokio time is paused and advanced manually.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor_epoch_ms: i64,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    /// Anchors at the current wall-clock time.
    pub fn new() -> Self {
        Self::anchored_at(SystemClock.now_ms())
    }

    /// Anchors at a fixed epoch timestamp.
    pub fn anchored_at(epoch_ms: i64) -> Self {
        Self {
            anchor_epoch_ms: epoch_ms,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.anchor_epoch_ms
            .saturating_add(duration_to_ms(self.anchor.elapsed()))
    }
}

fn duration_to_ms(value: Duration) -> i64 {
    i64::try_from(value.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, TokioClock};
    use std::time::Duration;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let observer = clock.clone();
        clock.advance(Duration::from_secs(2));
        assert_eq!(observer.now_ms(), 3_000);
        observer.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::anchored_at(5_000);
        assert_eq!(clock.now_ms(), 5_000);
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now_ms(), 95_000);
    }
}
