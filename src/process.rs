//! The process record, as seen by the memory core.
//!
//! The process subsystem proper (creation, scheduling, signals) lives
//! elsewhere in the kernel; the memory core only needs the address-space
//! half: the page directory and kernel stack, the saved stack pointer, the
//! CR3 image, and the table of attached regions.

use crate::region::{PRegion, NR_PREGIONS, PREG_STACK};
use crate::types::{Paddr, Pid, Vaddr};

/// Per-process state owned by the memory core.
pub struct Process {
    pub pid: Pid,

    /// Kernel-virtual address of the page directory.
    pub pgdir: Vaddr,

    /// Kernel-virtual address of the kernel stack page.
    pub kstack: Vaddr,

    /// Saved kernel stack pointer.
    pub kesp: Vaddr,

    /// Physical address of the page directory, as loaded into CR3.
    pub cr3: Paddr,

    /// Whether the process is currently executing in kernel mode. When
    /// set, the saved trap frame at `kesp` is live and must be relocated
    /// along with the kernel stack on address-space clone.
    pub kernel_running: bool,

    /// Attached regions, indexed by the `PREG_*` slots.
    pub pregions: [Option<PRegion>; NR_PREGIONS],
}

impl Process {
    /// A process record with no address space attached yet.
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            pgdir: 0,
            kstack: 0,
            kesp: 0,
            cr3: 0,
            kernel_running: false,
            pregions: [None, None, None],
        }
    }

    /// The process's stack region, if attached.
    pub fn stack(&self) -> Option<&PRegion> {
        self.pregions[PREG_STACK].as_ref()
    }
}
