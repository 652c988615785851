//! Unit of work over the in-memory backend.
//!
//! Two kinds of mutation, two disciplines:
//!
//! - **Claims** apply to the shared slot table as they execute. A claimed
//!   slot must be invisible to concurrent claimants immediately, and only
//!   the claimant ever sets the flag, so rollback can safely un-claim.
//! - **Releases and reservation writes** are staged inside the unit of
//!   work and applied under the table locks at commit. Staged writes never
//!   touch shared state early, so rollback (or dropping the unit of work
//!   uncommitted) simply discards them — there is no pre-image to restore,
//!   and a concurrent transaction's committed state can never be clobbered
//!   by a losing transaction backing out.
//!
//! Commit re-validates every staged reservation write against the table
//! version before applying, so a version race lost between `save` and
//! `commit` still surfaces as [`StoreError::Conflict`] (and the commit
//! un-claims this unit of work's slots before failing).
//!
//! Reads within the unit of work see its own staged writes. One
//! limitation: a slot released in this unit of work is not claimable again
//! by the same unit of work before commit; no use case needs that.

use crate::backend::MemoryBackend;
use chrono::{DateTime, Utc};
use slotbook_core::store::{BookingContext, ReservationStore, SlotStore, StoreError, UnitOfWork};
use slotbook_core::types::{ReservationId, SlotId, UserId};
use slotbook_core::{Reservation, Slot};
use std::collections::HashMap;
use std::sync::Arc;

/// Opens [`MemoryUnitOfWork`]s over a shared [`MemoryBackend`].
#[derive(Clone)]
pub struct MemoryContext {
    backend: Arc<MemoryBackend>,
}

impl MemoryContext {
    /// Creates a context over the given backend.
    #[must_use]
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }

    /// The shared backend, for seeding and assertions.
    #[must_use]
    pub fn backend(&self) -> &Arc<MemoryBackend> {
        &self.backend
    }
}

impl BookingContext for MemoryContext {
    type Uow = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, StoreError> {
        Ok(MemoryUnitOfWork {
            backend: Arc::clone(&self.backend),
            claimed: Vec::new(),
            released: Vec::new(),
            saves: HashMap::new(),
            committed: false,
        })
    }
}

/// A staged reservation write, applied at commit.
///
/// `Update` remembers the table version it was derived from so commit can
/// detect a version race lost after `save` returned.
#[derive(Debug)]
enum StagedSave {
    Insert(Reservation),
    Update { base: u64, reservation: Reservation },
}

impl StagedSave {
    fn reservation(&self) -> &Reservation {
        match self {
            Self::Insert(reservation) | Self::Update { reservation, .. } => reservation,
        }
    }

    fn into_reservation(self) -> Reservation {
        match self {
            Self::Insert(reservation) | Self::Update { reservation, .. } => reservation,
        }
    }
}

/// One transactional boundary over the in-memory tables.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    backend: Arc<MemoryBackend>,
    /// Slots this unit of work has marked reserved in the shared table.
    claimed: Vec<SlotId>,
    /// Slots to mark unreserved at commit.
    released: Vec<SlotId>,
    /// Reservation writes to apply at commit, keyed by id.
    saves: HashMap<ReservationId, StagedSave>,
    committed: bool,
}

impl MemoryUnitOfWork {
    fn undo_claims(&mut self) {
        if self.claimed.is_empty() {
            return;
        }
        let mut slots = self.backend.lock_slots();
        for id in self.claimed.drain(..) {
            if let Some(slot) = slots.get_mut(&id) {
                slot.is_reserved = false;
            }
        }
    }
}

impl SlotStore for MemoryUnitOfWork {
    async fn find_and_claim_nearest(
        &mut self,
        requested: DateTime<Utc>,
    ) -> Result<Option<Slot>, StoreError> {
        let mut slots = self.backend.lock_slots();

        // The scan and the mark happen under one lock acquisition, so no
        // concurrent claimant can observe the candidate between them.
        // Iteration is id-ascending, and min_by_key keeps the first
        // minimum, which yields the required (start_time, id) ordering.
        let claimed = slots
            .values_mut()
            .filter(|slot| !slot.is_reserved && slot.start_time >= requested)
            .min_by_key(|slot| slot.start_time)
            .map(|slot| {
                slot.is_reserved = true;
                slot.clone()
            });

        drop(slots);

        if let Some(slot) = &claimed {
            self.claimed.push(slot.id);
        }
        Ok(claimed)
    }

    async fn release(&mut self, slot_id: SlotId) -> Result<(), StoreError> {
        // Staged: the shared flag is only cleared at commit. Releasing an
        // unknown slot stays a no-op there, so release is idempotent.
        self.released.push(slot_id);
        Ok(())
    }

    async fn slot(&mut self, slot_id: SlotId) -> Result<Option<Slot>, StoreError> {
        let mut slot = self.backend.lock_slots().get(&slot_id).cloned();
        if let Some(slot) = &mut slot {
            if self.released.contains(&slot_id) {
                slot.is_reserved = false;
            }
        }
        Ok(slot)
    }
}

impl ReservationStore for MemoryUnitOfWork {
    async fn save(&mut self, reservation: Reservation) -> Result<Reservation, StoreError> {
        // A write already staged in this unit of work supersedes the table.
        if let Some(staged) = self.saves.get(&reservation.id) {
            let current = staged.reservation().version;
            if current != reservation.version {
                return Err(StoreError::Conflict {
                    id: reservation.id,
                    expected: reservation.version,
                    actual: current,
                });
            }
            let base = match staged {
                StagedSave::Update { base, .. } => Some(*base),
                StagedSave::Insert(_) => None,
            };
            let mut updated = reservation;
            updated.version += 1;
            let entry = match base {
                Some(base) => StagedSave::Update {
                    base,
                    reservation: updated.clone(),
                },
                None => StagedSave::Insert(updated.clone()),
            };
            self.saves.insert(updated.id, entry);
            return Ok(updated);
        }

        let stored_version = self
            .backend
            .lock_reservations()
            .get(&reservation.id)
            .map(|stored| stored.version);

        match stored_version {
            None => {
                self.saves
                    .insert(reservation.id, StagedSave::Insert(reservation.clone()));
                Ok(reservation)
            }
            Some(actual) => {
                if actual != reservation.version {
                    return Err(StoreError::Conflict {
                        id: reservation.id,
                        expected: reservation.version,
                        actual,
                    });
                }
                let mut updated = reservation;
                updated.version += 1;
                self.saves.insert(
                    updated.id,
                    StagedSave::Update {
                        base: actual,
                        reservation: updated.clone(),
                    },
                );
                Ok(updated)
            }
        }
    }

    async fn reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        if let Some(staged) = self.saves.get(&id) {
            return Ok(Some(staged.reservation().clone()));
        }
        Ok(self.backend.lock_reservations().get(&id).cloned())
    }

    async fn reservations_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut merged: HashMap<ReservationId, Reservation> = self
            .backend
            .lock_reservations()
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| (r.id, r.clone()))
            .collect();
        for staged in self.saves.values() {
            let reservation = staged.reservation();
            if reservation.user_id == user_id {
                merged.insert(reservation.id, reservation.clone());
            }
        }
        Ok(merged.into_values().collect())
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<(), StoreError> {
        {
            let mut table = self.backend.lock_reservations();

            // Re-validate every staged write against the live table before
            // applying any of them: a transaction that lost a version race
            // after save() must not commit a stale overwrite.
            let conflict = self.saves.iter().find_map(|(id, staged)| match staged {
                StagedSave::Insert(staged) => table
                    .get(id)
                    .map(|stored| (*id, staged.version, stored.version)),
                StagedSave::Update { base, .. } => match table.get(id) {
                    Some(stored) if stored.version == *base => None,
                    Some(stored) => Some((*id, *base, stored.version)),
                    None => Some((*id, *base, 0)),
                },
            });
            if let Some((id, expected, actual)) = conflict {
                drop(table);
                self.undo_claims();
                self.committed = true;
                tracing::warn!(
                    reservation_id = %id,
                    expected,
                    actual,
                    "commit aborted on version conflict"
                );
                return Err(StoreError::Conflict {
                    id,
                    expected,
                    actual,
                });
            }

            for (_, staged) in self.saves.drain() {
                let reservation = staged.into_reservation();
                table.insert(reservation.id, reservation);
            }
        }

        {
            let mut slots = self.backend.lock_slots();
            for id in self.released.drain(..) {
                if let Some(slot) = slots.get_mut(&id) {
                    slot.is_reserved = false;
                }
            }
        }

        self.claimed.clear();
        self.committed = true;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.undo_claims();
        self.released.clear();
        self.saves.clear();
        self.committed = true; // nothing left for Drop to do
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.committed {
            if !self.claimed.is_empty() {
                tracing::debug!(
                    claims = self.claimed.len(),
                    "un-claiming slots of dropped unit of work"
                );
            }
            self.undo_claims();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use slotbook_core::types::{ReservationId, SlotId, UserId};
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn context_with_hourly_slots(count: i64) -> MemoryContext {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_slots((0..count).map(|i| {
            let start = t0() + TimeDelta::hours(i);
            Slot::new(SlotId::new(i + 1), start, start + TimeDelta::hours(1)).unwrap()
        }));
        MemoryContext::new(backend)
    }

    async fn book_first_slot(context: &MemoryContext, user: UserId) -> ReservationId {
        let id = ReservationId::from_uuid(Uuid::now_v7());
        let mut uow = context.begin().await.unwrap();
        let slot = uow.find_and_claim_nearest(t0()).await.unwrap().unwrap();
        let reservation = Reservation::create(id, user, slot.id, t0(), t0()).unwrap();
        uow.save(reservation).await.unwrap();
        uow.commit().await.unwrap();
        id
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_rolled_back() {
        let context = context_with_hourly_slots(1);

        let mut first = context.begin().await.unwrap();
        let claimed = first.find_and_claim_nearest(t0()).await.unwrap().unwrap();
        assert_eq!(claimed.id, SlotId::new(1));

        // A concurrent unit of work must not see the mid-claim slot.
        let mut second = context.begin().await.unwrap();
        assert!(second.find_and_claim_nearest(t0()).await.unwrap().is_none());

        first.rollback().await.unwrap();

        // After rollback the slot is claimable again.
        let mut third = context.begin().await.unwrap();
        assert!(third.find_and_claim_nearest(t0()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn claim_orders_by_start_time_then_id() {
        let backend = Arc::new(MemoryBackend::new());
        // Two slots share a start time; the smaller id must win.
        let start = t0() + TimeDelta::hours(1);
        backend.seed_slots([
            Slot::new(SlotId::new(9), start, start + TimeDelta::hours(1)).unwrap(),
            Slot::new(SlotId::new(3), start, start + TimeDelta::hours(1)).unwrap(),
            Slot::new(SlotId::new(1), t0() + TimeDelta::hours(2), t0() + TimeDelta::hours(3))
                .unwrap(),
        ]);
        let context = MemoryContext::new(backend);

        let mut uow = context.begin().await.unwrap();
        let claimed = uow.find_and_claim_nearest(t0()).await.unwrap().unwrap();
        assert_eq!(claimed.id, SlotId::new(3));
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn release_applies_at_commit_and_is_idempotent() {
        let context = context_with_hourly_slots(1);
        book_first_slot(&context, UserId::new()).await;
        assert_eq!(context.backend().reserved_slot_count(), 1);

        let mut uow = context.begin().await.unwrap();
        uow.release(SlotId::new(1)).await.unwrap();
        uow.release(SlotId::new(1)).await.unwrap();
        uow.release(SlotId::new(404)).await.unwrap();

        // Staged: the shared flag is untouched until commit, but this unit
        // of work reads its own write.
        assert_eq!(context.backend().reserved_slot_count(), 1);
        assert!(!uow.slot(SlotId::new(1)).await.unwrap().unwrap().is_reserved);

        uow.commit().await.unwrap();
        assert_eq!(context.backend().reserved_slot_count(), 0);
    }

    #[tokio::test]
    async fn dropped_uncommitted_work_is_undone() {
        let context = context_with_hourly_slots(1);

        {
            let mut uow = context.begin().await.unwrap();
            uow.find_and_claim_nearest(t0()).await.unwrap().unwrap();
            // dropped without commit
        }

        assert_eq!(context.backend().reserved_slot_count(), 0);
    }

    #[tokio::test]
    async fn stale_version_save_conflicts() {
        let context = context_with_hourly_slots(1);
        let id = ReservationId::from_uuid(Uuid::now_v7());
        let reservation =
            Reservation::create(id, UserId::new(), SlotId::new(1), t0(), t0()).unwrap();

        let mut uow = context.begin().await.unwrap();
        let inserted = uow.save(reservation).await.unwrap();
        assert_eq!(inserted.version, 0);

        // First update bumps the staged version to 1.
        let mut first_copy = inserted.clone();
        first_copy.cancel(t0() + TimeDelta::minutes(5)).unwrap();
        let updated = uow.save(first_copy).await.unwrap();
        assert_eq!(updated.version, 1);

        // A second copy still at version 0 must be rejected.
        let mut second_copy = inserted;
        second_copy.cancel(t0() + TimeDelta::minutes(6)).unwrap();
        let err = uow.save(second_copy).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                id,
                expected: 0,
                actual: 1
            }
        );
        uow.commit().await.unwrap();
        assert_eq!(
            context.backend().reservation_snapshot(id).unwrap().version,
            1
        );
    }

    #[tokio::test]
    async fn losing_cancel_rollback_keeps_the_slot_free() {
        let context = context_with_hourly_slots(1);
        let user = UserId::new();
        let id = book_first_slot(&context, user).await;

        // Two cancellations race: both load the reservation, both release
        // the slot; the winner saves and commits first.
        let mut winner = context.begin().await.unwrap();
        let mut loser = context.begin().await.unwrap();

        let mut winner_copy = winner.reservation(id).await.unwrap().unwrap();
        let mut loser_copy = loser.reservation(id).await.unwrap().unwrap();

        loser.release(SlotId::new(1)).await.unwrap();
        winner.release(SlotId::new(1)).await.unwrap();

        winner_copy.cancel(t0() + TimeDelta::minutes(1)).unwrap();
        winner.save(winner_copy).await.unwrap();
        winner.commit().await.unwrap();

        loser_copy.cancel(t0() + TimeDelta::minutes(2)).unwrap();
        let err = loser.save(loser_copy).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        loser.rollback().await.unwrap();

        // The winner's cancellation stands: the loser backing out must not
        // re-reserve the slot the winner released.
        assert_eq!(context.backend().reserved_slot_count(), 0);
        let stored = context.backend().reservation_snapshot(id).unwrap();
        assert!(stored.is_cancelled());

        // And the freed slot is genuinely claimable again.
        let mut rebook = context.begin().await.unwrap();
        assert!(rebook.find_and_claim_nearest(t0()).await.unwrap().is_some());
        rebook.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn commit_detects_version_race_lost_after_save() {
        let context = context_with_hourly_slots(1);
        let user = UserId::new();
        let id = book_first_slot(&context, user).await;

        // Both transactions pass the save-time version check before either
        // commits; only the first commit may win.
        let mut first = context.begin().await.unwrap();
        let mut second = context.begin().await.unwrap();

        let mut first_copy = first.reservation(id).await.unwrap().unwrap();
        let mut second_copy = second.reservation(id).await.unwrap().unwrap();

        first_copy.cancel(t0()).unwrap();
        second_copy.mark_expired(t0()).unwrap();
        first.save(first_copy).await.unwrap();
        second.save(second_copy).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let stored = context.backend().reservation_snapshot(id).unwrap();
        assert!(stored.is_cancelled());
        assert_eq!(stored.version, 1);
    }
}
