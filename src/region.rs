//! Virtual-address regions.
//!
//! A region is a contiguous run of user pages with one access mode and an
//! optional backing file; a process attaches up to [`NR_PREGIONS`] of them
//! (text, data, stack). The region layer owns the page table its pages
//! live in and drives the paging engine's entry points: attaching marks
//! pages for demand fill or zero, detaching releases them, fork duplicates
//! them page by page with copy-on-write linking.
//!
//! Fault handling locks the region for the duration of a fill, which
//! serializes concurrent faults on the same region; the mutexes here are
//! the only locks the memory core takes.
//!
//! Regions span at most one page table (4 MiB), and two regions never
//! share a table slot: the table belongs to the region. The kernel proper
//! grows richer region shapes out of the same operations.

use alloc::sync::Arc;

use spin::Mutex;

use crate::fs::Inode;
use crate::hal::{PAGE_MASK, PAGE_SIZE};
use crate::mm::paging::{self, PageMark};
use crate::mm::pte::{pde_index, pte_index, PageTable, Pte};
use crate::mm::{Mm, MmError};
use crate::process::Process;
use crate::types::Vaddr;

/// Region slots per process.
pub const NR_PREGIONS: usize = 3;

/// Slot of the text region.
pub const PREG_TEXT: usize = 0;

/// Slot of the data region.
pub const PREG_DATA: usize = 1;

/// Slot of the stack region.
pub const PREG_STACK: usize = 2;

// ============================================================================
// Access Mode
// ============================================================================

/// Region access mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u32);

impl Mode {
    pub const MAY_READ: Self = Self(1);
    pub const MAY_WRITE: Self = Self(2);
    pub const MAY_EXEC: Self = Self(4);

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for Mode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ============================================================================
// Region Descriptor
// ============================================================================

/// Direction a region occupies its address range in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Grows toward higher addresses (text, data).
    Upward,
    /// Grows toward lower addresses (stack).
    Downward,
}

/// A region's backing file: pages fill from `inode` starting at `off`.
#[derive(Clone)]
pub struct FileMap {
    pub inode: Arc<dyn Inode>,
    pub off: u64,
}

/// A region descriptor. Shared between the region table and fault
/// handling through `Arc<Mutex<_>>`; the mutex is the region lock.
pub struct Region {
    mode: Mode,
    growth: Growth,
    size: usize,
    file: Option<FileMap>,
    /// Kernel page holding this region's page table, once attached.
    pgtab: Option<Vaddr>,
}

impl Region {
    /// An anonymous, demand-zero region.
    pub fn anon(mode: Mode, size: usize) -> Self {
        Self {
            mode,
            growth: Growth::Upward,
            size,
            file: None,
            pgtab: None,
        }
    }

    /// A downward-growing stack region.
    pub fn stack(size: usize) -> Self {
        Self {
            mode: Mode::MAY_READ | Mode::MAY_WRITE,
            growth: Growth::Downward,
            size,
            file: None,
            pgtab: None,
        }
    }

    /// A file-backed, demand-fill region.
    pub fn file_backed(mode: Mode, inode: Arc<dyn Inode>, off: u64, size: usize) -> Self {
        Self {
            mode,
            growth: Growth::Upward,
            size,
            file: Some(FileMap { inode, off }),
            pgtab: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn file(&self) -> Option<&FileMap> {
        self.file.as_ref()
    }

    pub fn pgtab(&self) -> Option<Vaddr> {
        self.pgtab
    }

    /// Wraps the region for sharing between the region table and fault
    /// handling.
    pub fn into_shared(self) -> Arc<Mutex<Region>> {
        Arc::new(Mutex::new(self))
    }
}

/// A region attached to a process at `start`.
///
/// For an upward region `start` is its lowest address; for a downward
/// region it is one past its highest.
#[derive(Clone)]
pub struct PRegion {
    pub start: Vaddr,
    pub region: Arc<Mutex<Region>>,
}

impl PRegion {
    /// Whether `addr` falls inside the region.
    pub fn contains(&self, addr: Vaddr) -> bool {
        let reg = self.region.lock();
        let (low, high) = span(self.start, &reg);
        low <= addr && addr < high
    }
}

/// The address range `[low, high)` a region occupies when attached at
/// `start`.
fn span(start: Vaddr, reg: &Region) -> (Vaddr, Vaddr) {
    match reg.growth {
        Growth::Upward => (start, start + reg.size as Vaddr),
        Growth::Downward => (start - reg.size as Vaddr, start),
    }
}

// ============================================================================
// Region Operations
// ============================================================================

/// Finds the slot of the region covering `addr`, if any.
pub fn findreg(proc: &Process, addr: Vaddr) -> Option<usize> {
    proc.pregions
        .iter()
        .position(|p| p.as_ref().is_some_and(|preg| preg.contains(addr)))
}

/// Attaches `region` to `proc` at `start` in `slot`.
///
/// Allocates the region's page table, maps it into the process directory
/// and marks every covered page demand-fill (file-backed) or demand-zero
/// (anonymous).
pub fn attachreg(
    mm: &mut Mm,
    proc: &mut Process,
    slot: usize,
    start: Vaddr,
    region: Arc<Mutex<Region>>,
) -> Result<(), MmError> {
    {
        let mut reg = region.lock();

        debug_assert_eq!(start & !PAGE_MASK, 0);
        debug_assert_eq!(reg.size % PAGE_SIZE, 0);
        if reg.pgtab.is_some() {
            panic!("mm: attaching a region twice");
        }

        let (low, high) = span(start, &reg);
        if pde_index(low) != pde_index(high - 1) {
            return Err(MmError::RegionTooBig);
        }

        let pgtab = mm
            .acquire_kpage(true)
            .ok_or(MmError::OutOfKernelPages)?;
        mm.mappgtab(proc, low, pgtab);

        let mark = match reg.file {
            Some(_) => PageMark::Fill,
            None => PageMark::Zero,
        };
        let tab = PageTable::of_page_mut(mm.phys.kpage_mut(pgtab));
        for va in (low..high).step_by(PAGE_SIZE) {
            paging::markpg(&mut tab[pte_index(va)], mark);
        }

        reg.pgtab = Some(pgtab);
    }

    proc.pregions[slot] = Some(PRegion { start, region });
    Ok(())
}

/// Detaches the region in `slot`, releasing every page it holds and its
/// page table. A no-op when the slot is empty.
pub fn detachreg(mm: &mut Mm, proc: &mut Process, slot: usize) {
    let Some(preg) = proc.pregions[slot].take() else {
        return;
    };

    let mut reg = preg.region.lock();
    let pgtab = match reg.pgtab.take() {
        Some(kv) => kv,
        None => panic!("mm: detaching a region with no page table"),
    };
    let (low, high) = span(preg.start, &reg);

    let tab = PageTable::of_page_mut(mm.phys.kpage_mut(pgtab));
    for va in (low..high).step_by(PAGE_SIZE) {
        paging::freeupg(&mut mm.frames, &mut mm.tlb, &mut tab[pte_index(va)]);
    }

    mm.umappgtab(proc, low);
    mm.release_kpage(pgtab);
}

/// Expands a locked region by `amount` bytes, marking the new pages
/// demand-zero. Downward regions grow toward lower addresses.
///
/// Fails with [`MmError::RegionTooBig`] when the expansion would leave the
/// region's page table.
pub fn growreg(
    mm: &mut Mm,
    preg: &PRegion,
    reg: &mut Region,
    amount: usize,
) -> Result<(), MmError> {
    debug_assert_eq!(amount % PAGE_SIZE, 0);

    let pgtab = match reg.pgtab {
        Some(kv) => kv,
        None => panic!("mm: growing a detached region"),
    };

    let (low, high) = span(preg.start, reg);
    let table = pde_index(low);

    let (mark_lo, mark_hi) = match reg.growth {
        Growth::Upward => {
            let new_high = match high.checked_add(amount as Vaddr) {
                Some(h) if pde_index(h - 1) == table => h,
                _ => return Err(MmError::RegionTooBig),
            };
            (high, new_high)
        }
        Growth::Downward => {
            let new_low = match low.checked_sub(amount as Vaddr) {
                Some(l) if pde_index(l) == table => l,
                _ => return Err(MmError::RegionTooBig),
            };
            (new_low, low)
        }
    };

    let tab = PageTable::of_page_mut(mm.phys.kpage_mut(pgtab));
    for va in (mark_lo..mark_hi).step_by(PAGE_SIZE) {
        paging::markpg(&mut tab[pte_index(va)], PageMark::Zero);
    }

    reg.size += amount;
    Ok(())
}

/// Duplicates every attached region of `src` into `dst`, linking each page
/// copy-on-write. Used by fork after the kernel half of the address space
/// has been cloned.
///
/// On failure the regions already duplicated stay attached to `dst`; the
/// caller tears the child down with [`detachreg`] and `dstrypgdir`.
pub fn dupregs(mm: &mut Mm, src: &Process, dst: &mut Process) -> Result<(), MmError> {
    for slot in 0..NR_PREGIONS {
        let Some(preg) = src.pregions[slot].as_ref() else {
            continue;
        };

        let sreg = preg.region.lock();
        let spgtab = match sreg.pgtab {
            Some(kv) => kv,
            None => panic!("mm: duplicating a detached region"),
        };
        let (low, high) = span(preg.start, &sreg);

        let dpgtab = mm
            .acquire_kpage(true)
            .ok_or(MmError::OutOfKernelPages)?;
        mm.mappgtab(dst, low, dpgtab);

        for va in (low..high).step_by(PAGE_SIZE) {
            let i = pte_index(va);
            let mut s = PageTable::of_page(mm.phys.kpage(spgtab))[i];
            let mut d = Pte::new();
            paging::linkupg(&mut mm.frames, &mut s, &mut d);
            PageTable::of_page_mut(mm.phys.kpage_mut(spgtab))[i] = s;
            PageTable::of_page_mut(mm.phys.kpage_mut(dpgtab))[i] = d;
        }

        dst.pregions[slot] = Some(PRegion {
            start: preg.start,
            region: Arc::new(Mutex::new(Region {
                mode: sreg.mode,
                growth: sreg.growth,
                size: sreg.size,
                file: sreg.file.clone(),
                pgtab: Some(dpgtab),
            })),
        });
    }

    // Parent pages just went read-only for copy-on-write.
    mm.tlb.flush();
    Ok(())
}
