//! jobring - bounded lock-free job queues for fixed worker pools
//!
//! Two flavors of a sequence-numbered ring buffer that dispatches
//! short-lived units of work across worker contexts with no locks, no OS
//! scheduler and no allocation per job:
//!
//! - [`SpmcQueue`] : single producer, multiple consumers
//! - [`MpmcQueue`] : multiple producers, multiple consumers
//!
//! Jobs are value types implementing [`Job`]. They are stored inline in a
//! cache-line-sized slot ([`PAYLOAD_BYTES`] bytes of storage), executed
//! exactly once by whichever worker claims them, and destroyed as soon as
//! `run` returns. `N` must be a power of two > 1.
//!
//! Submission blocks only in the `add` variants, which spin with a CPU
//! hint; everything else is a single bounded attempt or a lock-free CAS
//! retry loop.

#![cfg_attr(not(any(test, loom)), no_std)]
#![warn(missing_docs)]

use core::fmt;

mod cpu;
mod slot;
mod sync;

pub mod mpmc;
pub mod spmc;

pub use cpu::CACHE_LINE_SIZE;
pub use mpmc::MpmcQueue;
pub use slot::PAYLOAD_BYTES;
pub use spmc::{SpmcProducer, SpmcQueue};

/// A unit of work that can be stored inline in a queue slot.
///
/// `run` consumes the job; whatever it owns is released when it returns.
/// There is no result channel back to the submitter, so errors are the
/// job's own concern.
///
/// A job must fit in [`PAYLOAD_BYTES`] bytes; the bound is checked at
/// compile time when the job type is first submitted.
pub trait Job: Send + 'static {
    /// Execute the job.
    fn run(self);
}

/// Error returned by `try_add` on a full queue, handing the job back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddError<T>(pub T);

impl<T> fmt::Display for AddError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue is full")
    }
}
