//! Transactional units of work over a `PostgreSQL` pool.
//!
//! [`PgBookingContext::begin`] opens a database transaction;
//! [`PgUnitOfWork`] runs every store operation inside it. Commit and
//! rollback map onto the transaction's, and a dropped unit of work rolls
//! back automatically via sqlx's `Transaction` drop behaviour — a failed
//! use case therefore releases any slot it claimed without compensating
//! writes.
//!
//! The slot claim relies on `FOR UPDATE SKIP LOCKED`: concurrent claimants
//! skip each other's locked candidate rows instead of queueing on them, so
//! under contention each caller gets a distinct slot in one round trip.

use chrono::{DateTime, Utc};
use slotbook_core::store::{BookingContext, ReservationStore, SlotStore, StoreError, UnitOfWork};
use slotbook_core::types::{ReservationId, SlotId, UserId};
use slotbook_core::{Reservation, ReservationStatus, Slot};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

/// Opens [`PgUnitOfWork`]s over a shared connection pool.
#[derive(Clone)]
pub struct PgBookingContext {
    pool: PgPool,
}

impl PgBookingContext {
    /// Creates a context over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for migrations and test setup.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl BookingContext for PgBookingContext {
    type Uow = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, StoreError> {
        let tx = self.pool.begin().await.map_err(backend)?;
        Ok(PgUnitOfWork { tx })
    }
}

/// One database transaction. Dropping it without committing rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn slot_from_row(row: &PgRow) -> Result<Slot, StoreError> {
    Ok(Slot {
        id: SlotId::new(row.try_get("id").map_err(backend)?),
        start_time: row.try_get("start_time").map_err(backend)?,
        end_time: row.try_get("end_time").map_err(backend)?,
        is_reserved: row.try_get("is_reserved").map_err(backend)?,
    })
}

fn reservation_from_row(row: &PgRow) -> Result<Reservation, StoreError> {
    let id: Uuid = row.try_get("id").map_err(backend)?;
    let user_id: Uuid = row.try_get("user_id").map_err(backend)?;
    let slot_id: i64 = row.try_get("slot_id").map_err(backend)?;
    let status: String = row.try_get("status").map_err(backend)?;
    let status = ReservationStatus::parse(&status)
        .ok_or_else(|| StoreError::Backend(format!("unknown reservation status: {status}")))?;
    Ok(Reservation::from_parts(
        ReservationId::from_uuid(id),
        UserId::from_uuid(user_id),
        SlotId::new(slot_id),
        status,
        row.try_get("reserved_at").map_err(backend)?,
        row.try_get("cancelled_at").map_err(backend)?,
        row.try_get("created_at").map_err(backend)?,
        row.try_get("updated_at").map_err(backend)?,
        version_from_db(row.try_get("version").map_err(backend)?)?,
    ))
}

fn version_from_db(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Backend(format!("negative reservation version: {value}")))
}

fn version_to_db(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Backend(format!("reservation version out of range: {value}")))
}

impl SlotStore for PgUnitOfWork {
    async fn find_and_claim_nearest(
        &mut self,
        requested: DateTime<Utc>,
    ) -> Result<Option<Slot>, StoreError> {
        // The subselect locks the chosen row; SKIP LOCKED makes concurrent
        // claimants pass over each other's candidates instead of blocking,
        // so two transactions can never return the same slot.
        let row = sqlx::query(
            r"
            UPDATE slots
            SET is_reserved = TRUE
            WHERE id = (
                SELECT id FROM slots
                WHERE is_reserved = FALSE AND start_time >= $1
                ORDER BY start_time, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, start_time, end_time, is_reserved
            ",
        )
        .bind(requested)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        let claimed = row.as_ref().map(slot_from_row).transpose()?;
        if let Some(slot) = &claimed {
            tracing::debug!(slot_id = %slot.id, start_time = %slot.start_time, "slot claimed");
        }
        Ok(claimed)
    }

    async fn release(&mut self, slot_id: SlotId) -> Result<(), StoreError> {
        // Idempotent: releasing a free or unknown slot changes nothing.
        sqlx::query("UPDATE slots SET is_reserved = FALSE WHERE id = $1")
            .bind(slot_id.value())
            .execute(&mut *self.tx)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn slot(&mut self, slot_id: SlotId) -> Result<Option<Slot>, StoreError> {
        let row = sqlx::query(
            "SELECT id, start_time, end_time, is_reserved FROM slots WHERE id = $1",
        )
        .bind(slot_id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        row.as_ref().map(slot_from_row).transpose()
    }
}

const RESERVATION_COLUMNS: &str =
    "id, user_id, slot_id, status, reserved_at, cancelled_at, created_at, updated_at, version";

impl ReservationStore for PgUnitOfWork {
    async fn save(&mut self, reservation: Reservation) -> Result<Reservation, StoreError> {
        let expected = version_to_db(reservation.version)?;

        // Version-guarded update first. Zero rows means either the record
        // is new (insert it) or another writer got there first (conflict).
        let updated = sqlx::query(
            r"
            UPDATE reservations
            SET status = $2, cancelled_at = $3, updated_at = $4, version = version + 1
            WHERE id = $1 AND version = $5
            RETURNING version
            ",
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.status.as_str())
        .bind(reservation.cancelled_at)
        .bind(reservation.updated_at)
        .bind(expected)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        if let Some(row) = updated {
            let stored = version_from_db(row.try_get("version").map_err(backend)?)?;
            let mut saved = reservation;
            saved.version = stored;
            return Ok(saved);
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT version FROM reservations WHERE id = $1")
                .bind(reservation.id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(backend)?;

        if let Some(actual) = existing {
            let actual = version_from_db(actual)?;
            tracing::warn!(
                reservation_id = %reservation.id,
                expected = reservation.version,
                actual,
                "optimistic lock conflict"
            );
            return Err(StoreError::Conflict {
                id: reservation.id,
                expected: reservation.version,
                actual,
            });
        }

        sqlx::query(
            r"
            INSERT INTO reservations
                (id, user_id, slot_id, status, reserved_at, cancelled_at,
                 created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.user_id.as_uuid())
        .bind(reservation.slot_id.value())
        .bind(reservation.status.as_str())
        .bind(reservation.reserved_at)
        .bind(reservation.cancelled_at)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .bind(expected)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;

        Ok(reservation)
    }

    async fn reservation(
        &mut self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn reservations_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;

        rows.iter().map(reservation_from_row).collect()
    }
}

impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(backend)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(backend)
    }
}
