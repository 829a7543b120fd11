//! # Clock Module
//!
//! Timestamp primitives for contact records. All times are UTC epoch
//! milliseconds; `created_at` ordering is the sole primacy key, so the
//! representation must be totally ordered and cheap to compare.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A temporal instant as UTC epoch milliseconds.
///
/// Using i64 to support both past and future times and to avoid floating
/// point issues.
pub type Timestamp = i64;

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> Timestamp {
    let now = OffsetDateTime::now_utc();
    (now.unix_timestamp_nanos() / 1_000_000) as Timestamp
}

/// Timestamp source for stores.
///
/// `Wall` stamps real time. `Logical` advances by a fixed step per call and
/// exists for deterministic tests; with a step of zero it produces identical
/// `created_at` values, which is the clock-resolution collision the grouper's
/// tie-break has to handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Clock {
    Wall,
    Logical { next: Timestamp, step: i64 },
}

impl Clock {
    /// Deterministic clock starting at `start`, advancing by `step` per tick.
    pub fn logical(start: Timestamp, step: i64) -> Self {
        Clock::Logical { next: start, step }
    }

    /// Produce the next timestamp.
    pub fn tick(&mut self) -> Timestamp {
        match self {
            Clock::Wall => now_millis(),
            Clock::Logical { next, step } => {
                let now = *next;
                *next += *step;
                now
            }
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::Wall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_clock_advances_by_step() {
        let mut clock = Clock::logical(1_000, 250);
        assert_eq!(clock.tick(), 1_000);
        assert_eq!(clock.tick(), 1_250);
        assert_eq!(clock.tick(), 1_500);
    }

    #[test]
    fn test_logical_clock_zero_step_collides() {
        let mut clock = Clock::logical(42, 0);
        assert_eq!(clock.tick(), 42);
        assert_eq!(clock.tick(), 42);
    }

    #[test]
    fn test_wall_clock_is_recent() {
        let mut clock = Clock::Wall;
        // Anything after 2020-01-01 counts as sane.
        assert!(clock.tick() > 1_577_836_800_000);
    }
}
