//! # Slotbook Core
//!
//! The slot-allocation and reservation-lifecycle engine.
//!
//! This crate owns the parts of a booking system with real correctness
//! risk: finding the nearest unreserved slot at or after a requested time,
//! claiming it atomically under contention, and driving the reservation
//! state machine (create / cancel / expire) under optimistic concurrency.
//! Transport, DTOs, and authentication are thin plumbing owned by the
//! embedding application and deliberately absent here.
//!
//! ## Core Concepts
//!
//! - **Slot**: a fixed time interval, reservable by at most one active
//!   reservation at a time ([`slot::Slot`])
//! - **Reservation**: a user's claim on a slot, tracked through an explicit
//!   lifecycle ([`reservation::Reservation`])
//! - **Stores**: explicit contracts for the two shared mutable resources
//!   ([`store::SlotStore`], [`store::ReservationStore`])
//! - **Unit of work**: the all-or-nothing boundary every use case runs in
//!   ([`store::UnitOfWork`])
//! - **Orchestrator**: the create/cancel/list use cases
//!   ([`booking::BookingService`])
//!
//! ## Guarantees
//!
//! - Two concurrent requests never receive the same slot: the claim is
//!   linearizable per row (see [`store::SlotStore::find_and_claim_nearest`]).
//! - A cancelled slot becomes bookable again exactly once: cancellation
//!   releases the slot and terminal statuses never transition out.
//! - Lost updates on a reservation are detected, not absorbed: every
//!   state-changing persist is version-checked
//!   ([`store::StoreError::Conflict`]).
//!
//! ## Example
//!
//! ```ignore
//! use slotbook_core::booking::BookingService;
//! use slotbook_core::environment::{SystemClock, UuidV7Generator};
//! use std::sync::Arc;
//!
//! let service = BookingService::new(
//!     context,          // a BookingContext adapter (memory or postgres)
//!     users,            // Arc<dyn UserDirectory>
//!     Arc::new(SystemClock),
//!     Arc::new(UuidV7Generator),
//! );
//!
//! let reservation = service.create(user_id, None).await?;
//! let cancelled = service.cancel(reservation.id).await?;
//! ```

pub mod booking;
pub mod directory;
pub mod environment;
pub mod event;
pub mod reservation;
pub mod slot;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use booking::{BookingError, BookingService};
pub use directory::{User, UserDirectory};
pub use environment::{Clock, IdGenerator, SystemClock, UuidV7Generator};
pub use event::DomainEvent;
pub use reservation::{DomainError, Reservation, ReservationStatus, Transition};
pub use slot::Slot;
pub use store::{BookingContext, ReservationStore, SlotStore, StoreError, UnitOfWork};
pub use types::{ReservationId, SlotId, UserId};
