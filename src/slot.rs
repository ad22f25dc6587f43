//! One cache-line-sized queue cell plus the consumer-side claim protocol
//! shared by both queue flavors.

use core::cell::UnsafeCell;
use core::mem::{align_of, size_of, MaybeUninit};

use crate::cpu::CACHE_LINE_SIZE;
use crate::sync::{AtomicU32, Ordering};
use crate::Job;

/// What the erased entry point should do with the payload.
#[derive(Clone, Copy)]
pub(crate) enum SlotOp {
    /// Read the job out, run it, destroy it.
    Run,
    /// Destroy the job without running it (queue teardown).
    Drop,
}

/// Type-erased entry point stored alongside the payload.
pub(crate) type RunFn = unsafe fn(*mut u8, SlotOp);

/// Bytes available for a job value inside one slot: a cache line minus
/// the erased function pointer, the sequence word and its padding twin.
pub const PAYLOAD_BYTES: usize =
    CACHE_LINE_SIZE - size_of::<RunFn>() - 2 * size_of::<u32>();

/// A single ring cell, exactly one cache line.
///
/// `sequence` arbitrates ownership: for slot index `i` on lap `k` the
/// value `i + k*N` means free (producer may fill), `i + k*N + 1` means
/// filled (a consumer may claim). The payload and `run_fn` are defined
/// only while the slot is observed filled through an acquire load of
/// `sequence`.
#[repr(C, align(64))]
pub(crate) struct Slot {
    payload: UnsafeCell<MaybeUninit<[u8; PAYLOAD_BYTES]>>,
    run_fn: UnsafeCell<MaybeUninit<RunFn>>,
    pub(crate) sequence: AtomicU32,
}

#[cfg(not(loom))]
const _: () = assert!(size_of::<Slot>() == CACHE_LINE_SIZE);

// The payload only ever holds `Job` values, and `Job` requires `Send`;
// every access is gated by the sequence protocol.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Slot {
    pub(crate) fn new(sequence: u32) -> Self {
        Slot {
            payload: UnsafeCell::new(MaybeUninit::uninit()),
            run_fn: UnsafeCell::new(MaybeUninit::uninit()),
            sequence: AtomicU32::new(sequence),
        }
    }

    /// Move `job` into the payload and install its erased entry point.
    ///
    /// # Safety
    ///
    /// The caller must own the slot for production (its sequence matched
    /// the claimed head value) and must publish it afterwards with a
    /// release store on `sequence`.
    pub(crate) unsafe fn install<T: Job>(&self, job: T) {
        const {
            assert!(
                size_of::<T>() <= PAYLOAD_BYTES,
                "job does not fit in a slot payload"
            );
            assert!(
                align_of::<T>() <= CACHE_LINE_SIZE,
                "job over-aligned for a slot payload"
            );
        }
        (*self.run_fn.get()).write(run_erased::<T>);
        (*self.payload.get()).as_mut_ptr().cast::<T>().write(job);
    }

    /// Invoke the installed entry point; the payload is uninitialized
    /// again when this returns.
    ///
    /// # Safety
    ///
    /// The caller must own a filled slot: a consumer that acquired the
    /// filled sequence and won the tail CAS, or teardown code with
    /// exclusive access.
    pub(crate) unsafe fn consume(&self, op: SlotOp) {
        let run = (*self.run_fn.get()).assume_init_read();
        run((*self.payload.get()).as_mut_ptr().cast(), op);
    }
}

// Monomorphized per job type; the only place the erased payload regains
// its type.
unsafe fn run_erased<T: Job>(payload: *mut u8, op: SlotOp) {
    let job = payload.cast::<T>().read();
    match op {
        SlotOp::Run => job.run(),
        SlotOp::Drop => drop(job),
    }
}

/// Claim the next filled slot through `tail`, execute its job, hand the
/// slot back one lap ahead and bump `completed`.
///
/// Identical for both queue flavors. Returns `false` when no job is
/// ready.
pub(crate) fn run_next(slots: &[Slot], tail: &AtomicU32, completed: &AtomicU32) -> bool {
    let mask = slots.len() as u32 - 1;
    let lap = slots.len() as u32;

    // Optimistic read; the CAS below re-validates it.
    let mut t = tail.load(Ordering::Relaxed);
    loop {
        let slot = &slots[(t & mask) as usize];

        // Pairs with the producer's release store that published the job.
        let seq = slot.sequence.load(Ordering::Acquire);
        let diff = seq.wrapping_sub(t.wrapping_add(1)) as i32;
        if diff < 0 {
            // Not yet published for this lap.
            return false;
        }
        if diff > 0 {
            // Stale `t`: other consumers already claimed past it.
            t = tail.load(Ordering::Relaxed);
            continue;
        }

        // Relaxed on success: the payload was already acquired through
        // `sequence`; the CAS only decides which consumer owns the slot.
        // Weak, since failure re-enters the loop anyway.
        match tail.compare_exchange_weak(
            t,
            t.wrapping_add(1),
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                // Safety: filled sequence observed with acquire and the
                // CAS made this consumer the slot's unique owner.
                unsafe { slot.consume(SlotOp::Run) };

                // Hand the slot back to the producer for the next lap.
                slot.sequence.store(t.wrapping_add(lap), Ordering::Release);

                // Pairs with the acquire in wait_idle.
                completed.fetch_add(1, Ordering::Release);
                return true;
            }
            Err(current) => t = current,
        }
    }
}

/// Destroy every filled-but-unexecuted job in `[tail, head)`.
///
/// Teardown only: with exclusive access no claim is in flight, so that
/// range is exactly the filled slots.
pub(crate) fn drain(slots: &[Slot], tail: u32, head: u32) {
    let mask = slots.len() as u32 - 1;
    let mut pos = tail;
    while pos != head {
        let slot = &slots[(pos & mask) as usize];
        // Safety: exclusive access and `pos` is within the filled range.
        unsafe { slot.consume(SlotOp::Drop) };
        pos = pos.wrapping_add(1);
    }
}
