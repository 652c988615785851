//! Store contracts and the unit-of-work boundary.
//!
//! # Overview
//!
//! The engine mutates exactly two shared resources — the slot table and the
//! reservation table — and every mutation goes through one unit of work per
//! use case. The contracts here are what must be preserved; the persistence
//! technology behind them is an adapter's choice (`slotbook-memory`,
//! `slotbook-postgres`).
//!
//! ## The claim contract
//!
//! [`SlotStore::find_and_claim_nearest`] is the single most safety-critical
//! operation in the engine. Implementations must make the candidate's
//! read-then-mark sequence linearizable per row: under N simultaneous
//! callers with overlapping eligible windows, each free slot is handed to at
//! most one caller, and no caller ever observes a slot another caller is
//! mid-claim on. A row-level exclusive lock or an atomic conditional update
//! (`UPDATE … SET is_reserved = TRUE WHERE id = ? AND is_reserved = FALSE`)
//! both satisfy this; a plain read followed by a separate write does not.
//!
//! ## Not-found vs. failure
//!
//! Absence is a normal outcome and is modelled as `Ok(None)` / an empty
//! vector, never as an error; [`StoreError`] is reserved for optimistic-lock
//! conflicts and backend faults. The orchestrator promotes absence to
//! use-case errors where the use case requires presence.

use crate::reservation::Reservation;
use crate::slot::Slot;
use crate::types::{ReservationId, SlotId, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;

/// Errors surfaced by store adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic-concurrency conflict: the reservation's stored version no
    /// longer matches the version the caller loaded. The caller may retry
    /// the whole use case; the stores never retry internally.
    #[error(
        "version conflict on reservation {id}: expected version {expected}, found {actual}"
    )]
    Conflict {
        /// The contended reservation.
        id: ReservationId,
        /// The version the caller's copy was loaded at.
        expected: u64,
        /// The version actually stored.
        actual: u64,
    },

    /// The storage backend failed (connection, query, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Access to the slot table within one unit of work.
pub trait SlotStore {
    /// Finds the unreserved slot with the smallest `start_time >= requested`
    /// (ties broken by ascending slot id) and atomically marks it reserved
    /// before returning, excluding it from concurrent callers' view.
    ///
    /// Returns `Ok(None)` when no eligible slot exists — a normal business
    /// outcome, not a fault.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn find_and_claim_nearest(
        &mut self,
        requested: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Slot>, StoreError>> + Send;

    /// Marks a slot unreserved again. Idempotent: releasing an already-free
    /// or unknown slot is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn release(&mut self, slot_id: SlotId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Looks up a slot by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn slot(
        &mut self,
        slot_id: SlotId,
    ) -> impl Future<Output = Result<Option<Slot>, StoreError>> + Send;
}

/// Access to the reservation table within one unit of work.
pub trait ReservationStore {
    /// Persists a reservation.
    ///
    /// An unknown id is inserted at its current version (0 for a freshly
    /// created aggregate). A known id is updated
    /// only if the incoming version matches the stored version, and the
    /// stored version is bumped by exactly 1; the returned reservation
    /// carries the new version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the version check fails, and
    /// [`StoreError::Backend`] if the backend fails.
    fn save(
        &mut self,
        reservation: Reservation,
    ) -> impl Future<Output = Result<Reservation, StoreError>> + Send;

    /// Looks up a reservation by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn reservation(
        &mut self,
        id: ReservationId,
    ) -> impl Future<Output = Result<Option<Reservation>, StoreError>> + Send;

    /// All reservations belonging to a user. Read-only, no locking, and no
    /// ordering guarantee beyond what the backend provides.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    fn reservations_for_user(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Reservation>, StoreError>> + Send;
}

/// A transactional boundary over both stores: every mutation performed
/// through it either takes effect as a whole (`commit`) or not at all
/// (`rollback`, or drop without commit).
///
/// The slot claim and the reservation write for one use case always fall
/// inside the same unit of work, so a failure after the claim rolls the
/// claim back rather than leaking a reserved, reservation-less slot.
pub trait UnitOfWork: SlotStore + ReservationStore + Send {
    /// Makes every mutation performed through this unit of work durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails to commit.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized;

    /// Discards every mutation performed through this unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails to roll back.
    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized;
}

/// Factory for units of work; the orchestrator opens one per use case.
pub trait BookingContext: Send + Sync {
    /// The unit-of-work type this context produces.
    type Uow: UnitOfWork;

    /// Opens a new transactional context.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend cannot start a
    /// transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Uow, StoreError>> + Send;
}
