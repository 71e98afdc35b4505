//! Synchronization primitives
//!
//! Contains the generic queue and the semaphore/mutex adapters built on
//! top of it.

pub mod queue;

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;
