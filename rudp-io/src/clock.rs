//! Tick clock
//!
//! The protocol core counts time in caller-supplied ticks. This module maps
//! wall-clock time onto whole ticks of a fixed duration, carrying the
//! fractional remainder so no time is lost between calls.

use std::time::{Duration, Instant};

/// Shortest tick the clock accepts
pub const MIN_TICK: Duration = Duration::from_micros(1);

/// Converts elapsed wall-clock time into tick deltas
#[derive(Debug, Clone)]
pub struct TickClock {
    tick: Duration,
    last: Instant,
    /// Time elapsed past the last whole tick
    carry: Duration,
}

impl TickClock {
    /// Create a clock starting now
    pub fn new(tick: Duration) -> Self {
        Self::starting_at(tick, Instant::now())
    }

    /// Create a clock whose first tick is measured from `origin`
    pub fn starting_at(tick: Duration, origin: Instant) -> Self {
        TickClock {
            tick: tick.max(MIN_TICK),
            last: origin,
            carry: Duration::ZERO,
        }
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick
    }

    /// Whole ticks elapsed since the previous call
    pub fn advance(&mut self) -> u64 {
        self.advance_to(Instant::now())
    }

    /// Whole ticks elapsed between the previous call and `now`
    ///
    /// An `now` earlier than the previous call counts as no time.
    pub fn advance_to(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.last) + self.carry;
        self.last = self.last.max(now);

        let tick_ns = self.tick.as_nanos();
        let elapsed_ns = elapsed.as_nanos();
        self.carry = Duration::from_nanos((elapsed_ns % tick_ns) as u64);

        u64::try_from(elapsed_ns / tick_ns).unwrap_or(u64::MAX)
    }

    /// Time left until the next whole tick completes
    pub fn until_next_tick(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last) + self.carry;
        let tick_ns = self.tick.as_nanos();
        let into_tick = Duration::from_nanos((elapsed.as_nanos() % tick_ns) as u64);
        self.tick - into_tick
    }
}
