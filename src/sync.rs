//! Atomic primitives facade.
//!
//! A thin pass-through to the platform atomics: no extra fences, no
//! retries. Under `cfg(loom)` the same names resolve to loom's
//! model-checked replacements so the whole protocol can be explored by
//! `tests/loom_tests.rs`.

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU32, Ordering};
