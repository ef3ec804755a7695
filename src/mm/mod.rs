//! The memory subsystem.
//!
//! Three components, leaves first:
//! - [`kpool`]: reference-counted kernel pages (directories, tables,
//!   kernel stacks).
//! - [`frame`]: reference-counted user frames, shared by copy-on-write.
//! - [`paging`] and [`fault`]: the paging engine and its two fault
//!   handlers.
//!
//! Everything hangs off the [`Mm`] context: the physical windows, the two
//! reference-count tables, the TLB and the fault counters. The kernel owns
//! one `Mm` behind the module-level singleton ([`init`]/[`with`]); tests
//! build their own.

pub mod fault;
pub mod frame;
pub mod kpool;
pub mod paging;
pub mod pte;

use spin::{Mutex, Once};

use crate::hal::{
    kvirt_to_phys, PhysMem, Tlb, INITRD_VIRT, KBASE_VIRT, KPOOL_VIRT, KSTACK_SIZE, PAGE_SHIFT,
};
use crate::process::Process;
use crate::types::{Pid, Vaddr};

pub use frame::{FrameTable, NR_FRAMES};
pub use kpool::{KernelPool, NR_KPAGES};
pub use paging::{freeupg, linkupg, markpg, PageMark};
pub use pte::{pde_index, pte_index, PageDirectory, PageTable, Pde, Pte};

/// Errors of the memory core. All of these are recoverable resource
/// conditions; invariant violations panic instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// The kernel page pool is exhausted.
    OutOfKernelPages,
    /// User memory is exhausted.
    OutOfFrames,
    /// No region covers the faulting address.
    NoRegion,
    /// The access does not match the page's state (not a demand page, or
    /// not a copy-on-write write).
    BadAccess,
    /// The backing file could not be read.
    Io,
    /// The region would outgrow its page table.
    RegionTooBig,
}

/// Plain counters over the engine's activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmStats {
    pub vfaults: u64,
    pub pfaults: u64,
    pub zero_fills: u64,
    pub file_fills: u64,
    pub cow_breaks: u64,
}

/// The memory-core context.
///
/// Driven through `&mut` under the kernel's single-CPU, no-preemption
/// discipline; the only interior locks are the region mutexes.
pub struct Mm {
    pub phys: PhysMem,
    pub kpool: KernelPool,
    pub frames: FrameTable,
    pub tlb: Tlb,
    pub(crate) stats: MmStats,
    current: Pid,
}

impl Mm {
    pub fn new() -> Self {
        Self {
            phys: PhysMem::new(),
            kpool: KernelPool::new(),
            frames: FrameTable::new(),
            tlb: Tlb::new(),
            stats: MmStats::default(),
            current: Pid::IDLE,
        }
    }

    /// Allocates a kernel page, zeroed when `clean` is set. `None` on
    /// pool exhaustion.
    pub fn acquire_kpage(&mut self, clean: bool) -> Option<Vaddr> {
        self.kpool.acquire(&mut self.phys, clean)
    }

    /// Releases a kernel page. Double release is fatal.
    pub fn release_kpage(&mut self, kpg: Vaddr) {
        self.kpool.release(kpg)
    }

    /// Marks `pid` as the running process, for the "flush only the
    /// current address space" decisions. The scheduler calls this on every
    /// switch.
    pub fn set_current(&mut self, pid: Pid) {
        self.current = pid;
    }

    pub fn current(&self) -> Pid {
        self.current
    }

    pub fn stats(&self) -> &MmStats {
        &self.stats
    }

    /// Builds the master address space at boot and returns the idle
    /// process record owning it.
    ///
    /// The directory gets the four kernel slots every address space
    /// mirrors: the low identity map, the kernel window, the kernel page
    /// pool and the initrd window. Their tables start empty here; the boot
    /// layer populates them before paging is switched on.
    pub fn bootstrap(&mut self, pid: Pid) -> Result<Process, MmError> {
        const KERNEL_SLOTS: [Vaddr; 4] = [0, KBASE_VIRT, KPOOL_VIRT, INITRD_VIRT];

        let pgdir = self.acquire_kpage(true).ok_or(MmError::OutOfKernelPages)?;
        let kstack = match self.acquire_kpage(false) {
            Some(kv) => kv,
            None => {
                self.release_kpage(pgdir);
                return Err(MmError::OutOfKernelPages);
            }
        };

        let mut tabs: [Vaddr; 4] = [0; 4];
        for (i, tab) in tabs.iter_mut().enumerate() {
            *tab = match self.acquire_kpage(true) {
                Some(kv) => kv,
                None => {
                    for &t in &tabs[..i] {
                        self.release_kpage(t);
                    }
                    self.release_kpage(kstack);
                    self.release_kpage(pgdir);
                    return Err(MmError::OutOfKernelPages);
                }
            };
        }

        let dir = PageDirectory::of_page_mut(self.phys.kpage_mut(pgdir));
        for (&va, &tab) in KERNEL_SLOTS.iter().zip(tabs.iter()) {
            let pde = &mut dir[pde_index(va)];
            pde.assign();
            pde.set_frame(kvirt_to_phys(tab) >> PAGE_SHIFT);
        }

        let mut proc = Process::new(pid);
        proc.pgdir = pgdir;
        proc.kstack = kstack;
        proc.kesp = kstack + KSTACK_SIZE as Vaddr;
        proc.cr3 = kvirt_to_phys(pgdir);
        self.current = pid;

        Ok(proc)
    }
}

// ============================================================================
// Module-Level Singleton
// ============================================================================

static MM: Once<Mutex<Mm>> = Once::new();

/// Initializes the memory subsystem. Called once at boot.
pub fn init() {
    MM.call_once(|| Mutex::new(Mm::new()));
}

/// Runs `f` against the kernel's memory context.
pub fn with<R>(f: impl FnOnce(&mut Mm) -> R) -> R {
    let mm = MM.get().expect("mm: not initialized");
    f(&mut mm.lock())
}

/// Allocates a kernel page from the kernel's context.
pub fn acquire_kpage(clean: bool) -> Option<Vaddr> {
    with(|mm| mm.acquire_kpage(clean))
}

/// Releases a kernel page to the kernel's context.
pub fn release_kpage(kpg: Vaddr) {
    with(|mm| mm.release_kpage(kpg))
}
