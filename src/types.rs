//! Common types shared across the memory subsystem.
//!
//! Addresses are 32 bits: the paging model is a classic two-level i386
//! layout (see [`crate::hal`]). Frame numbers are absolute physical frame
//! numbers, i.e. `physical address >> PAGE_SHIFT`.

use core::sync::atomic::{AtomicU32, Ordering};

/// Virtual address.
pub type Vaddr = u32;

/// Physical address.
pub type Paddr = u32;

/// Physical frame number (`Paddr >> PAGE_SHIFT`).
pub type FrameNum = u32;

/// Process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pid(pub u32);

impl Pid {
    /// Pid of the idle process, owner of the master address space.
    pub const IDLE: Self = Self(0);

    /// Create a new process ID with a unique auto-incremented value.
    pub fn new() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(1);
        Pid(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}
