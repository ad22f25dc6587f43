//! CPU facade: the spin-wait hint and the cache-line geometry the slot
//! layout is computed from.

/// Cache line size, in bytes, that the slot layout and all padding are
/// calibrated for. 64 covers effectively all current x86_64 and most
/// aarch64 parts.
pub const CACHE_LINE_SIZE: usize = 64;

/// Spin-wait hint issued between polls of a blocking operation.
#[inline(always)]
pub(crate) fn pause() {
    #[cfg(loom)]
    loom::thread::yield_now();
    #[cfg(not(loom))]
    core::hint::spin_loop();
}

/// Wrapper keeping `value` alone on its cache line so concurrently
/// written fields never share one.
#[repr(align(64))]
pub(crate) struct CachePadded<T> {
    pub(crate) value: T,
}

impl<T> CachePadded<T> {
    pub(crate) const fn new(value: T) -> Self {
        CachePadded { value }
    }
}

const _: () = assert!(core::mem::align_of::<CachePadded<u32>>() == CACHE_LINE_SIZE);
