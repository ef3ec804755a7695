//! Kernel page pool.
//!
//! A fixed window of [`NR_KPAGES`] contiguous kernel-mapped pages starting
//! at [`KPOOL_VIRT`], tracked by per-page reference counts. The pool backs
//! every page-sized kernel allocation the memory core makes: page
//! directories, page tables and kernel stacks.
//!
//! Counts are reference counts rather than a free bit so a kernel page can
//! in principle be shared between owners; current callers only ever hold a
//! page at count one. Allocation is a first-fit linear scan — the pool is
//! tens of entries and allocation is rare.

use crate::hal::{PhysMem, KPOOL_SIZE, KPOOL_VIRT, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};
use crate::types::Vaddr;

/// Number of pages in the pool.
pub const NR_KPAGES: usize = KPOOL_SIZE / PAGE_SIZE;

/// The kernel page pool.
pub struct KernelPool {
    counts: [u16; NR_KPAGES],
}

impl KernelPool {
    pub const fn new() -> Self {
        Self {
            counts: [0; NR_KPAGES],
        }
    }

    fn id_to_addr(id: usize) -> Vaddr {
        KPOOL_VIRT + ((id as Vaddr) << PAGE_SHIFT)
    }

    fn addr_to_id(kpg: Vaddr) -> usize {
        let id = (kpg.wrapping_sub(KPOOL_VIRT) >> PAGE_SHIFT) as usize;
        if kpg < KPOOL_VIRT || id >= NR_KPAGES || kpg & !PAGE_MASK != 0 {
            panic!("mm: bad kernel page {:#010x}", kpg);
        }
        id
    }

    /// Allocates a kernel page, zeroing it when `clean` is set.
    ///
    /// Returns `None` when the pool is exhausted; callers must handle it.
    pub fn acquire(&mut self, phys: &mut PhysMem, clean: bool) -> Option<Vaddr> {
        let id = match self.counts.iter().position(|&c| c == 0) {
            Some(id) => id,
            None => {
                log::warn!("mm: kernel page pool overflow");
                return None;
            }
        };

        self.counts[id] += 1;
        let kpg = Self::id_to_addr(id);

        if clean {
            phys.kpage_mut(kpg).fill(0);
        }

        Some(kpg)
    }

    /// Releases a kernel page.
    ///
    /// # Panics
    ///
    /// Releasing a page whose count is already zero is a fatal invariant
    /// violation.
    pub fn release(&mut self, kpg: Vaddr) {
        let id = Self::addr_to_id(kpg);

        if self.counts[id] == 0 {
            panic!("mm: double free on kernel page");
        }
        self.counts[id] -= 1;
    }

    /// Number of free pages left in the pool.
    pub fn free_pages(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }
}
