//! Domain events recorded by the reservation aggregate.
//!
//! Events accumulate on the aggregate instance during a single use-case
//! invocation and are drained by the booking orchestrator once the unit of
//! work commits. They are not persisted here; delivering them to external
//! subscribers is the embedding application's concern.

use crate::types::{ReservationId, SlotId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event describing a reservation lifecycle fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A reservation was created and its slot claimed.
    ReservationCreated {
        /// The new reservation.
        reservation_id: ReservationId,
        /// The reserving user.
        user_id: UserId,
        /// The claimed slot.
        slot_id: SlotId,
        /// When the reservation took effect.
        timestamp: DateTime<Utc>,
    },

    /// An active reservation was cancelled and its slot released.
    ReservationCancelled {
        /// The cancelled reservation.
        reservation_id: ReservationId,
        /// The reserving user.
        user_id: UserId,
        /// The released slot.
        slot_id: SlotId,
        /// When the cancellation took effect.
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The reservation this event belongs to.
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        match self {
            Self::ReservationCreated { reservation_id, .. }
            | Self::ReservationCancelled { reservation_id, .. } => *reservation_id,
        }
    }

    /// When the event took effect.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ReservationCreated { timestamp, .. }
            | Self::ReservationCancelled { timestamp, .. } => *timestamp,
        }
    }
}
