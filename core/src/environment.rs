//! Injected dependencies: time and identity generation.
//!
//! Both are abstracted behind traits and handed to the orchestrator rather
//! than read ambiently, which keeps the aggregate's temporal validation and
//! the id assignment deterministic under test.

use crate::types::ReservationId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use slotbook_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generates reservation identities.
///
/// Invoked exactly once per new reservation. Implementations must produce
/// collision-resistant, time-sortable ids: sorting ids lexicographically
/// must sort reservations by creation time.
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh reservation id.
    fn reservation_id(&self) -> ReservationId;
}

/// Production generator emitting UUIDv7 ids.
///
/// v7 ids lead with a millisecond Unix timestamp, so both their binary and
/// hyphenated-string forms sort by creation time.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn reservation_id(&self) -> ReservationId {
        ReservationId::from_uuid(Uuid::now_v7())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn v7_ids_are_time_sortable() {
        let generator = UuidV7Generator;
        let a = generator.reservation_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generator.reservation_id();
        assert!(a < b);
        // String form sorts the same way as the binary form.
        assert!(a.to_string() < b.to_string());
    }
}
