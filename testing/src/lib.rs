//! # Slotbook Testing
//!
//! Test doubles and fixtures shared by the slotbook test suites.
//!
//! This crate provides:
//! - Mock implementations of environment traits (`FixedClock`,
//!   `SequentialIdGenerator`)
//! - Slot seeding helpers for arranging store contents
//!
//! ## Example
//!
//! ```
//! use slotbook_testing::{hourly_slots, test_clock};
//!
//! let clock = test_clock();
//! let slots = hourly_slots(clock_start(), 3);
//! assert_eq!(slots.len(), 3);
//! # use slotbook_testing::clock_start;
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use slotbook_core::environment::{Clock, IdGenerator};
use slotbook_core::types::{ReservationId, SlotId};
use slotbook_core::Slot;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Mock implementations for testing.
pub mod mocks {
    use super::{
        AtomicU64, Clock, DateTime, IdGenerator, Ordering, ReservationId, Utc, Uuid,
    };

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use slotbook_testing::mocks::FixedClock;
    /// use slotbook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Id generator emitting predictable, strictly increasing ids.
    ///
    /// Each id embeds a counter in the UUID's node bits, so ids are unique
    /// and sort in generation order like production v7 ids do, while
    /// remaining stable enough to assert against.
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        counter: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator starting at id 1.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// How many ids have been handed out so far.
        pub fn issued(&self) -> u64 {
            self.counter.load(Ordering::SeqCst)
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn reservation_id(&self) -> ReservationId {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            ReservationId::from_uuid(Uuid::from_u128(u128::from(n)))
        }
    }
}

/// Create a default fixed clock for tests (2026-03-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> mocks::FixedClock {
    mocks::FixedClock::new(clock_start())
}

/// The instant [`test_clock`] is pinned to.
///
/// # Panics
///
/// Panics if the hardcoded timestamp fails to parse, which should never
/// happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn clock_start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
        .expect("hardcoded timestamp should always parse")
        .with_timezone(&Utc)
}

/// Seed data: `count` back-to-back one-hour slots, the first starting at
/// `first_start`, with ids 1..=count.
///
/// # Panics
///
/// Panics only if the one-hour interval were inverted, which cannot happen.
#[must_use]
#[allow(clippy::expect_used)]
pub fn hourly_slots(first_start: DateTime<Utc>, count: i64) -> Vec<Slot> {
    (0..count)
        .map(|i| {
            let start = first_start + TimeDelta::hours(i);
            Slot::new(SlotId::new(i + 1), start, start + TimeDelta::hours(1))
                .expect("one-hour interval is always valid")
        })
        .collect()
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIdGenerator};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), clock_start());
    }

    #[test]
    fn sequential_ids_increase() {
        let ids = SequentialIdGenerator::new();
        let a = ids.reservation_id();
        let b = ids.reservation_id();
        assert!(a < b);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn hourly_slots_are_contiguous_and_free() {
        let slots = hourly_slots(clock_start(), 3);
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(|s| !s.is_reserved));
        assert_eq!(slots[0].end_time, slots[1].start_time);
        assert_eq!(slots[1].end_time, slots[2].start_time);
        assert_eq!(slots[2].id, SlotId::new(3));
    }
}
