//! End-to-end walkthrough of the booking engine on the in-memory adapter:
//! seed slots and a user, book twice, cancel, rebook the freed slot, and
//! list the resulting history.
//!
//! Run with: `cargo run -p slotbook-memory --example booking_demo`

#![allow(clippy::unwrap_used)]

use chrono::{TimeDelta, Utc};
use slotbook_core::environment::{SystemClock, UuidV7Generator};
use slotbook_core::types::{SlotId, UserId};
use slotbook_core::{BookingService, Slot, User};
use slotbook_memory::{MemoryBackend, MemoryContext, MemoryUserDirectory};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Five back-to-back one-hour slots starting an hour from now.
    let first_start = Utc::now() + TimeDelta::hours(1);
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_slots((0..5).map(|i| {
        let start = first_start + TimeDelta::hours(i);
        Slot::new(SlotId::new(i + 1), start, start + TimeDelta::hours(1)).unwrap()
    }));

    let directory = MemoryUserDirectory::new();
    let user_id = UserId::new();
    directory.insert(User {
        id: user_id,
        username: "ada".into(),
        email: "ada@example.com".into(),
        created_at: Utc::now(),
    });

    let service = BookingService::new(
        MemoryContext::new(Arc::clone(&backend)),
        Arc::new(directory),
        Arc::new(SystemClock),
        Arc::new(UuidV7Generator),
    );

    let first = service.create(user_id, None).await?;
    println!(
        "booked reservation {} for slot {} starting {}",
        first.id, first.slot_id, first_start
    );

    let second = service.create(user_id, None).await?;
    println!("booked reservation {} for slot {}", second.id, second.slot_id);

    let cancelled = service.cancel(first.id).await?;
    println!(
        "cancelled reservation {} (status {})",
        cancelled.id, cancelled.status
    );

    // The freed slot is claimable again, under a brand-new reservation.
    let rebooked = service.create(user_id, None).await?;
    println!(
        "rebooked slot {} as reservation {}",
        rebooked.slot_id, rebooked.id
    );

    println!("\nreservations for {user_id}:");
    for reservation in service.list(user_id).await? {
        println!(
            "  {}  slot {}  {}  v{}",
            reservation.id, reservation.slot_id, reservation.status, reservation.version
        );
    }

    Ok(())
}
