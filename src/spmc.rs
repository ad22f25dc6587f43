//! Single-producer multi-consumer job queue.
//!
//! Submission goes through a unique handle ([`SpmcProducer`]); `head` is
//! plain memory only that handle touches, so the submission path performs
//! no atomic read-modify-write at all. Consumers claim filled slots by
//! CAS on `tail`.
//!
//! The submission path keeps non-atomic producer state, so it must not be
//! re-entered: a context that can be preempted by another submitter to
//! the same queue (e.g. an interrupt handler that enqueues work) must
//! mask that source, or use [`MpmcQueue`](crate::mpmc::MpmcQueue).

use core::cell::UnsafeCell;

use crate::cpu::{pause, CachePadded};
use crate::slot::{self, Slot};
use crate::sync::{AtomicBool, AtomicU32, Ordering};
use crate::{AddError, Job};

/// Bounded single-producer multi-consumer job queue over `N` slots.
///
/// `N` must be a power of two greater than 1 (checked at compile time).
#[repr(C, align(64))]
pub struct SpmcQueue<const N: usize> {
    slots: [Slot; N],
    // Each counter is alone on its cache line; `slots` is a whole number
    // of lines, so the struct stays free of false sharing throughout.
    head: CachePadded<UnsafeCell<u32>>,
    tail: CachePadded<AtomicU32>,
    completed: CachePadded<AtomicU32>,
    producer_live: AtomicBool,
}

// Consumers only touch `slots`, `tail` and `completed`, all synchronized
// atomically; `head` is reserved to the unique producer handle.
unsafe impl<const N: usize> Send for SpmcQueue<N> {}
unsafe impl<const N: usize> Sync for SpmcQueue<N> {}

impl<const N: usize> SpmcQueue<N> {
    /// Create a queue with every slot free for lap 0.
    pub fn new() -> Self {
        const {
            assert!(
                N.is_power_of_two() && N > 1 && N <= 1 << 31,
                "queue capacity must be a power of two > 1"
            )
        };
        SpmcQueue {
            slots: core::array::from_fn(|i| Slot::new(i as u32)),
            head: CachePadded::new(UnsafeCell::new(0)),
            tail: CachePadded::new(AtomicU32::new(0)),
            completed: CachePadded::new(AtomicU32::new(0)),
            producer_live: AtomicBool::new(false),
        }
    }

    /// Take the submission handle. Returns `None` while another handle is
    /// live; dropping the handle makes a new one available.
    pub fn producer(&self) -> Option<SpmcProducer<'_, N>> {
        // Acquire pairs with the release in SpmcProducer::drop so a new
        // producer sees the previous handle's head.
        self.producer_live
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
            .then(|| SpmcProducer { queue: self })
    }

    /// Claim and execute the next ready job. Returns `false` when nothing
    /// is ready. Callable from any number of threads.
    pub fn run_next(&self) -> bool {
        slot::run_next(&self.slots, &self.tail.value, &self.completed.value)
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    #[cfg(test)]
    fn seed(&mut self, base: u32) {
        assert_eq!(base & (N as u32 - 1), 0);
        unsafe { *self.head.value.get() = base };
        self.tail.value.store(base, Ordering::Relaxed);
        self.completed.value.store(base, Ordering::Relaxed);
        for (i, s) in self.slots.iter().enumerate() {
            s.sequence.store(base.wrapping_add(i as u32), Ordering::Relaxed);
        }
    }
}

impl<const N: usize> Default for SpmcQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Drop for SpmcQueue<N> {
    fn drop(&mut self) {
        // Exclusive access: destroy jobs submitted but never executed.
        let head = unsafe { *self.head.value.get() };
        let tail = self.tail.value.load(Ordering::Relaxed);
        slot::drain(&self.slots, tail, head);
    }
}

/// Unique submission handle for an [`SpmcQueue`].
///
/// At most one handle is live per queue, which is what makes the plain,
/// non-atomic `head` sound.
pub struct SpmcProducer<'a, const N: usize> {
    queue: &'a SpmcQueue<N>,
}

impl<const N: usize> SpmcProducer<'_, N> {
    #[inline]
    fn head(&self) -> u32 {
        unsafe { *self.queue.head.value.get() }
    }

    /// Try to submit a job; hands it back if the queue is full.
    pub fn try_add<T: Job>(&mut self, job: T) -> Result<(), AddError<T>> {
        let h = self.head();
        let entry = &self.queue.slots[h as usize & (N - 1)];

        // Pairs with the consumer's release store that recycled the slot.
        if entry.sequence.load(Ordering::Acquire) != h {
            // Still filled from the previous lap.
            return Err(AddError(job));
        }

        // Safety: the sequence matched `head`, so the slot is free and
        // owned by this unique producer until the store below.
        unsafe { entry.install(job) };
        unsafe { *self.queue.head.value.get() = h.wrapping_add(1) };

        // Publishes the payload and entry point to consumers.
        entry.sequence.store(h.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Submit a job, spinning while the queue is full.
    pub fn add<T: Job>(&mut self, mut job: T) {
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

    /// Jobs submitted but not yet finished.
    pub fn active_count(&self) -> u32 {
        self.head()
            .wrapping_sub(self.queue.completed.value.load(Ordering::Relaxed))
    }

    /// Spin until every submitted job has finished.
    ///
    /// The acquire on `completed` makes the side effects of every
    /// finished job visible to the caller.
    pub fn wait_idle(&self) {
        // `head` cannot move: this handle is the only producer.
        let head = self.head();
        while self.queue.completed.value.load(Ordering::Acquire) != head {
            pause();
        }
    }
}

impl<const N: usize> Drop for SpmcProducer<'_, N> {
    fn drop(&mut self) {
        // Release pairs with the acquire in `producer()`, handing `head`
        // over to the next handle.
        self.queue.producer_live.store(false, Ordering::Release);
    }
}
