//! Shared in-memory tables.
//!
//! One `MemoryBackend` instance is the storage; units of work share it via
//! `Arc`. Each table sits behind its own mutex, and every store operation
//! takes a lock only for the duration of that operation — in particular the
//! claim scan runs entirely under the slot-table lock, which is what makes
//! the claim linearizable per row.

use slotbook_core::types::{ReservationId, SlotId, UserId};
use slotbook_core::{Reservation, Slot};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// In-memory slot and reservation tables.
///
/// Poisoned locks are unrecoverable here (a panicked writer may have left a
/// table half-updated), so lock acquisition propagates the poison as a
/// panic rather than papering over it.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: Mutex<BTreeMap<SlotId, Slot>>,
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the slot table. Slots are created out-of-band in this system;
    /// this is the out-of-band.
    pub fn seed_slots<I: IntoIterator<Item = Slot>>(&self, slots: I) {
        let mut table = self.lock_slots();
        for slot in slots {
            table.insert(slot.id, slot);
        }
    }

    /// A point-in-time copy of one slot, for assertions and diagnostics.
    #[must_use]
    pub fn slot_snapshot(&self, id: SlotId) -> Option<Slot> {
        self.lock_slots().get(&id).cloned()
    }

    /// How many slots are currently marked reserved.
    #[must_use]
    pub fn reserved_slot_count(&self) -> usize {
        self.lock_slots().values().filter(|s| s.is_reserved).count()
    }

    /// A point-in-time copy of one reservation.
    #[must_use]
    pub fn reservation_snapshot(&self, id: ReservationId) -> Option<Reservation> {
        self.lock_reservations().get(&id).cloned()
    }

    /// How many reservations a user holds, in any status.
    #[must_use]
    pub fn reservation_count_for(&self, user_id: UserId) -> usize {
        self.lock_reservations()
            .values()
            .filter(|r| r.user_id == user_id)
            .count()
    }

    #[allow(clippy::expect_used)]
    pub(crate) fn lock_slots(&self) -> MutexGuard<'_, BTreeMap<SlotId, Slot>> {
        self.slots.lock().expect("slot table lock poisoned")
    }

    #[allow(clippy::expect_used)]
    pub(crate) fn lock_reservations(&self) -> MutexGuard<'_, HashMap<ReservationId, Reservation>> {
        self.reservations
            .lock()
            .expect("reservation table lock poisoned")
    }
}
