//! The booking orchestrator.
//!
//! Coordinates the slot store and the reservation store across one unit of
//! work per use case:
//!
//! - **create**: verify user → claim nearest slot → build aggregate →
//!   persist reservation → commit. The claim happens before the reservation
//!   persist; if the persist fails, the unit of work is rolled back, which
//!   releases the claimed slot inside the same transactional boundary
//!   instead of leaking a reserved, reservation-less slot.
//! - **cancel**: load reservation → transition the aggregate → release the
//!   slot → persist both sides → commit.
//! - **list**: pure read, no locking.
//!
//! Nothing here retries: conflicts and not-found outcomes are surfaced to
//! the caller unchanged. Domain events recorded by the aggregate are
//! drained here and emitted as structured tracing events after the commit;
//! delivery to real subscribers belongs to the embedding application.

use crate::directory::UserDirectory;
use crate::environment::{Clock, IdGenerator};
use crate::event::DomainEvent;
use crate::reservation::{DomainError, Reservation};
use crate::store::{BookingContext, ReservationStore, SlotStore, StoreError, UnitOfWork};
use crate::types::{ReservationId, SlotId, UserId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Use-case-level errors returned by [`BookingService`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The reserving user does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// No unreserved slot starts at or after the requested time. A normal
    /// business outcome, not a system fault.
    #[error("no available slot at or after {0}")]
    NoAvailableSlot(DateTime<Utc>),

    /// The reservation to cancel does not exist.
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    /// An active reservation references a slot that is gone — an internal
    /// invariant violation, since slots are never deleted by this engine.
    #[error("slot {slot_id} not found for active reservation {reservation_id}")]
    SlotMissing {
        /// The missing slot.
        slot_id: SlotId,
        /// The reservation referencing it.
        reservation_id: ReservationId,
    },

    /// The aggregate rejected the operation (invalid argument or illegal
    /// state transition).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A store failed (version conflict or backend fault).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Books slots for users and drives the reservation lifecycle.
///
/// Each use case runs on the caller's task; the only blocking point is the
/// slot row contended inside `find_and_claim_nearest`.
pub struct BookingService<C: BookingContext> {
    context: C,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl<C: BookingContext> BookingService<C> {
    /// Creates a service over the given transactional context and
    /// collaborators.
    pub fn new(
        context: C,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            context,
            users,
            clock,
            ids,
        }
    }

    /// Books the nearest free slot starting at or after `requested_time`
    /// (defaulting to now) for `user_id`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::UserNotFound`] if the user does not exist.
    /// - [`BookingError::NoAvailableSlot`] if every eligible slot is taken.
    /// - [`BookingError::Store`] if persistence fails; the claimed slot is
    ///   released by the rolled-back unit of work.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: UserId,
        requested_time: Option<DateTime<Utc>>,
    ) -> Result<Reservation, BookingError> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or(BookingError::UserNotFound(user_id))?;

        let requested = requested_time.unwrap_or_else(|| self.clock.now());

        let mut uow = self.context.begin().await?;

        let Some(slot) = uow.find_and_claim_nearest(requested).await? else {
            return Err(BookingError::NoAvailableSlot(requested));
        };

        let now = self.clock.now();
        let mut reservation = match Reservation::create(
            self.ids.reservation_id(),
            user_id,
            slot.id,
            now,
            now,
        ) {
            Ok(reservation) => reservation,
            Err(err) => {
                // Dropping the unit of work releases the claim.
                drop(uow);
                return Err(err.into());
            }
        };
        let events = reservation.take_events();

        match uow.save(reservation).await {
            Ok(saved) => {
                uow.commit().await?;
                tracing::info!(
                    reservation_id = %saved.id,
                    slot_id = %saved.slot_id,
                    "reservation created"
                );
                Self::emit(&events);
                Ok(saved)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    slot_id = %slot.id,
                    "reservation persist failed; rolling back slot claim"
                );
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err.into())
            }
        }
    }

    /// Cancels an active reservation, releasing its slot in the same unit
    /// of work.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ReservationNotFound`] if the reservation is absent.
    /// - [`BookingError::Domain`] if the reservation is not `ACTIVE`.
    /// - [`BookingError::SlotMissing`] if the referenced slot is gone
    ///   (internal invariant violation).
    /// - [`BookingError::Store`] on a version conflict or backend fault.
    #[tracing::instrument(skip(self), fields(reservation_id = %reservation_id))]
    pub async fn cancel(&self, reservation_id: ReservationId) -> Result<Reservation, BookingError> {
        // Any early return below drops the unit of work, which rolls it back.
        let mut uow = self.context.begin().await?;

        let Some(mut reservation) = uow.reservation(reservation_id).await? else {
            return Err(BookingError::ReservationNotFound(reservation_id));
        };

        let now = self.clock.now();
        reservation.cancel(now)?;

        let Some(slot) = uow.slot(reservation.slot_id).await? else {
            return Err(BookingError::SlotMissing {
                slot_id: reservation.slot_id,
                reservation_id,
            });
        };

        uow.release(slot.id).await?;

        let events = reservation.take_events();
        let saved = uow.save(reservation).await?;
        uow.commit().await?;

        tracing::info!(
            reservation_id = %saved.id,
            slot_id = %saved.slot_id,
            "reservation cancelled"
        );
        Self::emit(&events);
        Ok(saved)
    }

    /// Lists every reservation belonging to `user_id`. Pure read; no
    /// ordering guarantee beyond what the store provides.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the backend fails.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Reservation>, BookingError> {
        let mut uow = self.context.begin().await?;
        let reservations = uow.reservations_for_user(user_id).await?;
        uow.commit().await?;
        Ok(reservations)
    }

    fn emit(events: &[DomainEvent]) {
        for event in events {
            tracing::info!(event = ?event, "domain event recorded");
        }
    }
}
