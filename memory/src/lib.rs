//! In-process storage adapter for the booking engine.
//!
//! Everything lives in mutex-guarded tables inside a [`MemoryBackend`];
//! a [`MemoryContext`] opens units of work over it that claim slots
//! eagerly and stage every other write until commit. The adapter honours
//! the same contracts as the postgres one — exclusive slot claims,
//! optimistic reservation versioning, rollback on drop — which makes it
//! the default harness for service-level tests and demos.
//!
//! ```
//! use slotbook_memory::{MemoryBackend, MemoryContext};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let context = MemoryContext::new(backend);
//! ```

pub mod backend;
pub mod directory;
pub mod uow;

pub use backend::MemoryBackend;
pub use directory::MemoryUserDirectory;
pub use uow::{MemoryContext, MemoryUnitOfWork};
