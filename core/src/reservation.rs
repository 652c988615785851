//! The reservation aggregate and its state machine.
//!
//! A reservation is a user's claim on a slot, tracked through an explicit
//! lifecycle:
//!
//! ```text
//! ACTIVE ──cancel()──────▶ CANCELLED   (terminal)
//!   │
//!   └────mark_expired()──▶ EXPIRED     (terminal)
//! ```
//!
//! No other transitions exist. The aggregate validates its inputs at
//! construction, guards every transition, and records [`DomainEvent`]s for
//! the orchestrator to drain after a successful commit.
//!
//! All timestamps are passed in by the caller (ultimately from an injected
//! [`crate::environment::Clock`]) so the temporal validation stays
//! deterministic under test.

use crate::event::DomainEvent;
use crate::types::{ReservationId, SlotId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

/// Errors raised by the reservation aggregate itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A construction precondition was violated. Not retryable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A lifecycle transition was attempted from a terminal status.
    /// Not retryable; surface as a client error.
    #[error(
        "cannot {attempted} reservation {id} with status {status}; \
         only ACTIVE reservations can be {}",
        .attempted.past_tense()
    )]
    InvalidStateTransition {
        /// The reservation on which the transition was attempted.
        id: ReservationId,
        /// The attempted transition, e.g. `cancel`.
        attempted: Transition,
        /// The status the reservation was actually in.
        status: ReservationStatus,
    },
}

/// A lifecycle transition name, carried in transition errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// `ACTIVE → CANCELLED`
    Cancel,
    /// `ACTIVE → EXPIRED`
    Expire,
}

impl Transition {
    /// The transition verb, e.g. `cancel`.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::Expire => "expire",
        }
    }

    /// The transition's past tense, e.g. `cancelled`.
    #[must_use]
    pub const fn past_tense(&self) -> &'static str {
        match self {
            Self::Cancel => "cancelled",
            Self::Expire => "expired",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Reservation lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// The reservation currently holds its slot. The only non-terminal
    /// status.
    Active,
    /// The reservation was cancelled and its slot released. Terminal.
    Cancelled,
    /// The reservation lapsed without being used. Terminal.
    Expired,
}

impl ReservationStatus {
    /// Canonical uppercase name, as stored by persistence adapters.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parse the canonical uppercase name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(Self::Active),
            "CANCELLED" => Some(Self::Cancelled),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event list kept inline: a single use case records at most one event.
type EventList = SmallVec<[DomainEvent; 2]>;

/// A user's claim on a slot, tracked through an explicit lifecycle and
/// persisted with an optimistic-concurrency version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identity; immutable after creation.
    pub id: ReservationId,
    /// The reserving user.
    pub user_id: UserId,
    /// The claimed slot.
    pub slot_id: SlotId,
    /// Current lifecycle status.
    pub status: ReservationStatus,
    /// When the reservation took effect. Never in the future.
    pub reserved_at: DateTime<Utc>,
    /// Set iff `status == Cancelled`.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When the aggregate was created.
    pub created_at: DateTime<Utc>,
    /// When the aggregate last changed.
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter; bumped by exactly 1 on every
    /// successful state-changing persist.
    pub version: u64,

    /// Events recorded during the current use-case invocation. Drained by
    /// the orchestrator via [`Reservation::take_events`]; never persisted.
    #[serde(skip)]
    events: EventList,
}

impl Reservation {
    /// Creates a new `Active` reservation at version 0 and records a
    /// [`DomainEvent::ReservationCreated`].
    ///
    /// `now` is the aggregate's construction time, supplied by the caller's
    /// clock; `reserved_at` must not lie after it.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidArgument`] if `reserved_at` is in the
    /// future relative to `now`.
    pub fn create(
        id: ReservationId,
        user_id: UserId,
        slot_id: SlotId,
        reserved_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if reserved_at > now {
            return Err(DomainError::InvalidArgument(format!(
                "reservedAt {reserved_at} cannot be in the future (now {now})"
            )));
        }

        let mut reservation = Self {
            id,
            user_id,
            slot_id,
            status: ReservationStatus::Active,
            reserved_at,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
            events: EventList::new(),
        };

        reservation.record(DomainEvent::ReservationCreated {
            reservation_id: id,
            user_id,
            slot_id,
            timestamp: reserved_at,
        });

        Ok(reservation)
    }

    /// Rebuilds an aggregate from persisted state, with no pending events.
    ///
    /// Used by store adapters when mapping rows back into the domain.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ReservationId,
        user_id: UserId,
        slot_id: SlotId,
        status: ReservationStatus,
        reserved_at: DateTime<Utc>,
        cancelled_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: u64,
    ) -> Self {
        Self {
            id,
            user_id,
            slot_id,
            status,
            reserved_at,
            cancelled_at,
            created_at,
            updated_at,
            version,
            events: EventList::new(),
        }
    }

    /// Cancels an active reservation and records a
    /// [`DomainEvent::ReservationCancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidStateTransition`] unless the current
    /// status is `Active`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.guard_active(Transition::Cancel)?;

        self.status = ReservationStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;

        self.record(DomainEvent::ReservationCancelled {
            reservation_id: self.id,
            user_id: self.user_id,
            slot_id: self.slot_id,
            timestamp: now,
        });

        Ok(())
    }

    /// Marks an active reservation as expired.
    ///
    /// The expiry trigger (a background sweep or similar) lives outside this
    /// engine; only the legal transition is defined here, and no event is
    /// recorded for it.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidStateTransition`] unless the current
    /// status is `Active`.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.guard_active(Transition::Expire)?;

        self.status = ReservationStatus::Expired;
        self.updated_at = now;

        Ok(())
    }

    /// Whether the reservation currently holds its slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Whether the reservation has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == ReservationStatus::Cancelled
    }

    /// Whether the reservation has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.status == ReservationStatus::Expired
    }

    /// Events recorded so far in this invocation, without draining them.
    #[must_use]
    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Drains and returns the recorded events.
    ///
    /// The orchestrator calls this once per use case, after the unit of
    /// work commits.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        self.events.drain(..).collect()
    }

    fn guard_active(&self, attempted: Transition) -> Result<(), DomainError> {
        if self.status == ReservationStatus::Active {
            Ok(())
        } else {
            Err(DomainError::InvalidStateTransition {
                id: self.id,
                attempted,
                status: self.status,
            })
        }
    }

    fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }
}

// Aggregate identity: equality and hashing by id alone.
impl PartialEq for Reservation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Reservation {}

impl std::hash::Hash for Reservation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn new_id() -> ReservationId {
        ReservationId::from_uuid(Uuid::now_v7())
    }

    fn active_reservation() -> Reservation {
        Reservation::create(new_id(), UserId::new(), SlotId::new(1), now(), now()).unwrap()
    }

    #[test]
    fn create_starts_active_at_version_zero() {
        let reservation = active_reservation();
        assert!(reservation.is_active());
        assert_eq!(reservation.version, 0);
        assert_eq!(reservation.cancelled_at, None);
        assert_eq!(reservation.created_at, now());
    }

    #[test]
    fn create_records_created_event() {
        let reservation = active_reservation();
        assert_eq!(reservation.events().len(), 1);
        match &reservation.events()[0] {
            DomainEvent::ReservationCreated {
                reservation_id,
                slot_id,
                timestamp,
                ..
            } => {
                assert_eq!(*reservation_id, reservation.id);
                assert_eq!(*slot_id, SlotId::new(1));
                assert_eq!(*timestamp, now());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn create_rejects_future_reserved_at() {
        let err = Reservation::create(
            new_id(),
            UserId::new(),
            SlotId::new(1),
            now() + TimeDelta::seconds(1),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn create_accepts_reserved_at_equal_to_now() {
        assert!(Reservation::create(new_id(), UserId::new(), SlotId::new(1), now(), now()).is_ok());
    }

    #[test]
    fn cancel_sets_cancelled_at_and_records_event() {
        let mut reservation = active_reservation();
        reservation.take_events();

        let later = now() + TimeDelta::minutes(30);
        reservation.cancel(later).unwrap();

        assert!(reservation.is_cancelled());
        assert_eq!(reservation.cancelled_at, Some(later));
        assert_eq!(reservation.updated_at, later);
        assert!(matches!(
            reservation.events()[0],
            DomainEvent::ReservationCancelled { .. }
        ));
    }

    #[test]
    fn cancel_twice_fails_and_records_no_second_event() {
        let mut reservation = active_reservation();
        reservation.take_events();

        reservation.cancel(now()).unwrap();
        let err = reservation.cancel(now() + TimeDelta::minutes(1)).unwrap_err();

        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                attempted: Transition::Cancel,
                status: ReservationStatus::Cancelled,
                ..
            }
        ));
        // One cancellation, one event.
        assert_eq!(reservation.events().len(), 1);
    }

    #[test]
    fn expire_requires_active() {
        let mut reservation = active_reservation();
        reservation.mark_expired(now()).unwrap();
        assert!(reservation.is_expired());

        let err = reservation.mark_expired(now()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                attempted: Transition::Expire,
                status: ReservationStatus::Expired,
                ..
            }
        ));
    }

    #[test]
    fn cancel_after_expire_fails() {
        let mut reservation = active_reservation();
        reservation.mark_expired(now()).unwrap();
        assert!(reservation.cancel(now()).is_err());
    }

    #[test]
    fn take_events_drains() {
        let mut reservation = active_reservation();
        assert_eq!(reservation.take_events().len(), 1);
        assert!(reservation.events().is_empty());
        assert!(reservation.take_events().is_empty());
    }

    #[test]
    fn identity_is_by_id_alone() {
        let a = active_reservation();
        let mut b = Reservation::from_parts(
            a.id,
            UserId::new(),
            SlotId::new(99),
            ReservationStatus::Expired,
            now(),
            None,
            now(),
            now(),
            7,
        );
        b.updated_at = now() + TimeDelta::hours(1);
        assert_eq!(a, b);
    }

    #[test]
    fn transition_error_message_names_status() {
        let mut reservation = active_reservation();
        reservation.cancel(now()).unwrap();
        let message = reservation.cancel(now()).unwrap_err().to_string();
        assert!(message.contains("CANCELLED"));
        assert!(message.contains("only ACTIVE reservations can be cancelled"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Any strictly positive future offset is rejected; any
            // non-negative past offset is accepted.
            #[test]
            fn reserved_at_validation(offset_secs in -3_600_i64..3_600) {
                let reserved_at = now() + TimeDelta::seconds(offset_secs);
                let result = Reservation::create(
                    new_id(),
                    UserId::new(),
                    SlotId::new(1),
                    reserved_at,
                    now(),
                );
                prop_assert_eq!(result.is_ok(), offset_secs <= 0);
            }

            // Terminal statuses never transition out, whichever terminal
            // state we start from and whichever transition we attempt.
            #[test]
            fn terminal_states_stay_terminal(expire_first: bool, try_cancel: bool) {
                let mut reservation = active_reservation();
                if expire_first {
                    reservation.mark_expired(now()).unwrap();
                } else {
                    reservation.cancel(now()).unwrap();
                }
                let before = reservation.status;
                let result = if try_cancel {
                    reservation.cancel(now())
                } else {
                    reservation.mark_expired(now())
                };
                prop_assert!(result.is_err());
                prop_assert_eq!(reservation.status, before);
            }
        }
    }
}
