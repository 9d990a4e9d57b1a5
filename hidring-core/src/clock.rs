// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Monotonic tick sources.
//!
//! Record timestamps are written by the producer process, so the consumer
//! must read the same clock. [`MonotonicClock`] uses `CLOCK_MONOTONIC`,
//! which is system-wide on Linux.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A monotonic tick counter plus its conversion to wall durations.
pub trait TickSource {
    /// Current tick count.
    fn now(&self) -> u64;

    /// Convert a tick delta into a duration.
    fn ticks_to_duration(&self, ticks: u64) -> Duration;

    /// Convert a duration into ticks, saturating at `u64::MAX`.
    fn duration_to_ticks(&self, duration: Duration) -> u64;
}

/// `CLOCK_MONOTONIC` in nanoseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl TickSource for MonotonicClock {
    fn now(&self) -> u64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec. CLOCK_MONOTONIC is always supported on Linux.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc != 0 {
            tracing::error!(
                error = %std::io::Error::last_os_error(),
                "clock_gettime(CLOCK_MONOTONIC) failed"
            );
            return 0;
        }
        (ts.tv_sec as u64)
            .saturating_mul(1_000_000_000)
            .saturating_add(ts.tv_nsec as u64)
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        Duration::from_nanos(ticks)
    }

    fn duration_to_ticks(&self, duration: Duration) -> u64 {
        u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Hand-driven clock in nanosecond ticks, for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }

    pub fn advance(&self, by: Duration) {
        let delta = self.duration_to_ticks(by);
        self.ticks.fetch_add(delta, Ordering::Relaxed);
    }
}

impl TickSource for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        Duration::from_nanos(ticks)
    }

    fn duration_to_ticks(&self, duration: Duration) -> u64 {
        u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
    }
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn now(&self) -> u64 {
        (**self).now()
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        (**self).ticks_to_duration(ticks)
    }

    fn duration_to_ticks(&self, duration: Duration) -> u64 {
        (**self).duration_to_ticks(duration)
    }
}

impl<T: TickSource + ?Sized> TickSource for std::sync::Arc<T> {
    fn now(&self) -> u64 {
        (**self).now()
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        (**self).ticks_to_duration(ticks)
    }

    fn duration_to_ticks(&self, duration: Duration) -> u64 {
        (**self).duration_to_ticks(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a > 0);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_millis(2));
        assert_eq!(clock.now(), 2_001_000);
        assert_eq!(
            clock.ticks_to_duration(clock.now() - 1_000),
            Duration::from_millis(2)
        );
    }
}
