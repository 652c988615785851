//! `PostgreSQL` storage adapter for the booking engine.
//!
//! Implements the core store traits over sqlx connection pools:
//!
//! - Transactional units of work (claim, persist, and release happen inside
//!   one database transaction)
//! - Atomic nearest-slot claims via `FOR UPDATE SKIP LOCKED`
//! - Optimistic reservation versioning via version-guarded updates
//!
//! # Example
//!
//! ```ignore
//! use slotbook_postgres::{PgBookingContext, PgUserDirectory, PostgresConfig};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PostgresConfig::from_env().connect().await?;
//!     let context = PgBookingContext::new(pool.clone());
//!     let directory = PgUserDirectory::new(pool);
//!     Ok(())
//! }
//! ```
//!
//! The schema lives in `schema.sql` at the crate root.

pub mod config;
pub mod context;
pub mod directory;

pub use config::PostgresConfig;
pub use context::{PgBookingContext, PgUnitOfWork};
pub use directory::PgUserDirectory;
