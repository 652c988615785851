//! Bookable time slots.
//!
//! A slot is a fixed `[start_time, end_time)` interval with a reservation
//! flag. Slots are seeded out-of-band and never deleted by this engine; the
//! only mutation the booking orchestrator performs is toggling
//! `is_reserved` through the slot store.

use crate::types::SlotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when constructing a [`Slot`] with an inverted interval.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("slot {id} has an invalid interval: start {start_time} is not before end {end_time}")]
pub struct InvalidSlotInterval {
    /// The offending slot id.
    pub id: SlotId,
    /// Interval start.
    pub start_time: DateTime<Utc>,
    /// Interval end.
    pub end_time: DateTime<Utc>,
}

/// A fixed time interval that can be reserved by at most one active
/// reservation at a time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identity.
    pub id: SlotId,
    /// Interval start (inclusive).
    pub start_time: DateTime<Utc>,
    /// Interval end (exclusive).
    pub end_time: DateTime<Utc>,
    /// Whether the slot is currently claimed by a reservation.
    pub is_reserved: bool,
}

impl Slot {
    /// Creates an unreserved slot, enforcing `start_time < end_time`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSlotInterval`] if the interval is empty or inverted.
    pub fn new(
        id: SlotId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, InvalidSlotInterval> {
        if start_time >= end_time {
            return Err(InvalidSlotInterval {
                id,
                start_time,
                end_time,
            });
        }
        Ok(Self {
            id,
            start_time,
            end_time,
            is_reserved: false,
        })
    }
}

// Entity identity: two slots are the same slot iff they share an id,
// regardless of flag or interval values.
impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Slot {}

impl std::hash::Hash for Slot {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
