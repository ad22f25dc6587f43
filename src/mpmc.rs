//! Multi-producer multi-consumer job queue.
//!
//! Same ring and sequence protocol as [`spmc`](crate::spmc), but `head`
//! is an atomic contended by producers through a weak CAS loop, so any
//! number of threads may submit through a shared reference.
//!
//! Because submission keeps no producer-private state, the path is safe
//! against preemption by another submitter to the same queue: a producer
//! interrupted mid-`try_add` either observes its head as stale and
//! reloads, or wins the CAS untouched. Work may therefore be enqueued
//! from interrupt context on top of an interrupted producer.

use crate::cpu::{pause, CachePadded};
use crate::slot::{self, Slot};
use crate::sync::{AtomicU32, Ordering};
use crate::{AddError, Job};

/// Bounded multi-producer multi-consumer job queue over `N` slots.
///
/// `N` must be a power of two greater than 1 (checked at compile time).
#[repr(C, align(64))]
pub struct MpmcQueue<const N: usize> {
    slots: [Slot; N],
    // One cache line each; `slots` is a whole number of lines.
    head: CachePadded<AtomicU32>,
    tail: CachePadded<AtomicU32>,
    completed: CachePadded<AtomicU32>,
}

unsafe impl<const N: usize> Send for MpmcQueue<N> {}
unsafe impl<const N: usize> Sync for MpmcQueue<N> {}

impl<const N: usize> MpmcQueue<N> {
    /// Create a queue with every slot free for lap 0.
    pub fn new() -> Self {
        const {
            assert!(
                N.is_power_of_two() && N > 1 && N <= 1 << 31,
                "queue capacity must be a power of two > 1"
            )
        };
        MpmcQueue {
            slots: core::array::from_fn(|i| Slot::new(i as u32)),
            head: CachePadded::new(AtomicU32::new(0)),
            tail: CachePadded::new(AtomicU32::new(0)),
            completed: CachePadded::new(AtomicU32::new(0)),
        }
    }

    /// Try to submit a job; hands it back if the queue is full.
    /// Callable from any number of threads.
    pub fn try_add<T: Job>(&self, job: T) -> Result<(), AddError<T>> {
        let mut h = self.head.value.load(Ordering::Relaxed);
        loop {
            let entry = &self.slots[(h & (N as u32 - 1)) as usize];

            // Pairs with the consumer's release store that recycled the
            // slot.
            let seq = entry.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(h) as i32;
            if diff < 0 {
                // Still filled from the previous lap.
                return Err(AddError(job));
            }
            if diff > 0 {
                // Stale `h`: another producer already claimed past it.
                h = self.head.value.load(Ordering::Relaxed);
                continue;
            }

            // Relaxed on success: nothing is published until the release
            // store below. Weak, since failure re-enters the loop anyway.
            match self.head.value.compare_exchange_weak(
                h,
                h.wrapping_add(1),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // Safety: the CAS claimed this slot for production.
                    unsafe { entry.install(job) };

                    // Publishes the payload and entry point to consumers.
                    entry.sequence.store(h.wrapping_add(1), Ordering::Release);
                    return Ok(());
                }
                Err(current) => h = current,
            }
        }
    }

    /// Submit a job, spinning while the queue is full.
    pub fn add<T: Job>(&self, mut job: T) {
        loop {
            match self.try_add(job) {
                Ok(()) => return,
                Err(AddError(back)) => {
                    job = back;
                    pause();
                }
            }
        }
    }

    /// Claim and execute the next ready job. Returns `false` when nothing
    /// is ready. Callable from any number of threads.
    pub fn run_next(&self) -> bool {
        slot::run_next(&self.slots, &self.tail.value, &self.completed.value)
    }

    /// Jobs submitted but not yet finished. Racy by nature: producers may
    /// be advancing `head` while this reads it.
    pub fn active_count(&self) -> u32 {
        let h = self.head.value.load(Ordering::Relaxed);
        h.wrapping_sub(self.completed.value.load(Ordering::Relaxed))
    }

    /// Spin until every submitted job has finished.
    ///
    /// Meaningful only once the caller knows no further submissions will
    /// arrive; termination is undefined while producers keep adding. The
    /// acquire on `completed` makes the side effects of every finished
    /// job visible to the caller.
    pub fn wait_idle(&self) {
        loop {
            let head = self.head.value.load(Ordering::Relaxed);
            if self.completed.value.load(Ordering::Acquire) == head {
                return;
            }
            pause();
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    #[cfg(test)]
    fn seed(&mut self, base: u32) {
        assert_eq!(base & (N as u32 - 1), 0);
        self.head.value.store(base, Ordering::Relaxed);
        self.tail.value.store(base, Ordering::Relaxed);
        self.completed.value.store(base, Ordering::Relaxed);
        for (i, s) in self.slots.iter().enumerate() {
            s.sequence.store(base.wrapping_add(i as u32), Ordering::Relaxed);
        }
    }
}

impl<const N: usize> Default for MpmcQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Drop for MpmcQueue<N> {
    fn drop(&mut self) {
        // Exclusive access: destroy jobs submitted but never executed.
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Relaxed);
        slot::drain(&self.slots, tail, head);
    }
}
