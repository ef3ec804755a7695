//! The paging engine.
//!
//! Per-process page directories and the operations over their entries:
//! mapping page tables in and out, cloning and destroying address spaces,
//! lazily materializing user pages (zero-fill or from a backing file),
//! releasing them, and copy-on-write.
//!
//! Page tables live in kernel pages owned by the region layer, so the
//! operations that act on a single PTE (`freeupg`, `markpg`, `linkupg`)
//! are free functions over `&mut Pte`; everything that walks a process
//! directory is a method on [`Mm`].
//!
//! ## TLB discipline
//!
//! Every mutation of a present mapping in the current address space is
//! followed by a flush. `linkupg` is the one exception: it runs once per
//! entry over whole tables, so its caller flushes after the batch.

use crate::hal::{
    kvirt_to_phys, phys_to_kvirt, rebase_kernel_context, PhysMem, Tlb, INITRD_VIRT, KBASE_VIRT,
    KPOOL_VIRT, KSTACK_SIZE, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE,
};
use crate::mm::frame::FrameTable;
use crate::mm::pte::{pde_index, pte_index, PageDirectory, PageTable, Pde, Pte};
use crate::mm::{Mm, MmError};
use crate::process::Process;
use crate::region::{Mode, Region};
use crate::types::Vaddr;

/// Demand state to stamp on a non-present page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMark {
    /// Populate from the region's backing file on first touch.
    Fill,
    /// Populate with zeros on first touch.
    Zero,
}

// ============================================================================
// Directory Walking
// ============================================================================

impl Mm {
    /// The page directory entry covering `addr`.
    pub fn pde(&self, proc: &Process, addr: Vaddr) -> Pde {
        PageDirectory::of_page(self.phys.kpage(proc.pgdir))[pde_index(addr)]
    }

    /// Kernel-virtual base of the page table covering `addr`.
    fn pgtab_kv(&self, proc: &Process, addr: Vaddr) -> Vaddr {
        let pde = self.pde(proc, addr);
        if pde.is_clear() {
            panic!("mm: no page table over {:#010x}", addr);
        }
        phys_to_kvirt(pde.frame() << PAGE_SHIFT)
    }

    /// The page table entry covering `addr`. The covering table must be
    /// mapped.
    pub fn pte(&self, proc: &Process, addr: Vaddr) -> Pte {
        let tab = self.pgtab_kv(proc, addr);
        PageTable::of_page(self.phys.kpage(tab))[pte_index(addr)]
    }

    pub(crate) fn set_pte(&mut self, proc: &Process, addr: Vaddr, pg: Pte) {
        let tab = self.pgtab_kv(proc, addr);
        PageTable::of_page_mut(self.phys.kpage_mut(tab))[pte_index(addr)] = pg;
    }
}

// ============================================================================
// Page Table Mapping
// ============================================================================

impl Mm {
    /// Installs the kernel page at `pgtab` as `proc`'s page table over
    /// `addr`.
    ///
    /// # Panics
    ///
    /// The directory slot must be clear; mapping over a live table is a
    /// fatal invariant violation.
    pub fn mappgtab(&mut self, proc: &Process, addr: Vaddr, pgtab: Vaddr) {
        let dir = PageDirectory::of_page_mut(self.phys.kpage_mut(proc.pgdir));
        let pde = &mut dir[pde_index(addr)];

        if !pde.is_clear() {
            panic!("mm: busy page directory entry");
        }

        pde.assign();
        pde.set_frame(kvirt_to_phys(pgtab) >> PAGE_SHIFT);

        if proc.pid == self.current() {
            self.tlb.flush();
        }
    }

    /// Removes `proc`'s page table over `addr`.
    ///
    /// # Panics
    ///
    /// The directory slot must be mapped; unmapping what is not mapped is
    /// a fatal invariant violation.
    pub fn umappgtab(&mut self, proc: &Process, addr: Vaddr) {
        let dir = PageDirectory::of_page_mut(self.phys.kpage_mut(proc.pgdir));
        let pde = &mut dir[pde_index(addr)];

        if pde.is_clear() {
            panic!("mm: unmapping a page table that is not mapped");
        }

        pde.clear();

        if proc.pid == self.current() {
            self.tlb.flush();
        }
    }
}

// ============================================================================
// Address-Space Clone and Teardown
// ============================================================================

impl Mm {
    /// Builds `new`'s address space by cloning the kernel half of `curr`'s:
    /// a fresh directory carrying the kernel slots, and a byte copy of the
    /// kernel stack with the saved context rebased onto it.
    ///
    /// User mappings are not cloned here; the region layer links them
    /// afterwards, page by page.
    pub fn crtpgdir(&mut self, curr: &Process, new: &mut Process) -> Result<(), MmError> {
        let pgdir = self.acquire_kpage(true).ok_or(MmError::OutOfKernelPages)?;
        let kstack = match self.acquire_kpage(false) {
            Some(kv) => kv,
            None => {
                self.release_kpage(pgdir);
                return Err(MmError::OutOfKernelPages);
            }
        };

        // The kernel half of every directory mirrors the master's.
        let kernel_pdes = {
            let dir = PageDirectory::of_page(self.phys.kpage(curr.pgdir));
            [
                dir[0],
                dir[pde_index(KBASE_VIRT)],
                dir[pde_index(KPOOL_VIRT)],
                dir[pde_index(INITRD_VIRT)],
            ]
        };
        {
            let dir = PageDirectory::of_page_mut(self.phys.kpage_mut(pgdir));
            dir[0] = kernel_pdes[0];
            dir[pde_index(KBASE_VIRT)] = kernel_pdes[1];
            dir[pde_index(KPOOL_VIRT)] = kernel_pdes[2];
            dir[pde_index(INITRD_VIRT)] = kernel_pdes[3];
        }

        // Clone the kernel stack and relocate the saved context onto it.
        self.phys
            .physcpy(kvirt_to_phys(kstack), kvirt_to_phys(curr.kstack), KSTACK_SIZE);
        new.kesp = rebase_kernel_context(
            &mut self.phys,
            curr.kstack,
            kstack,
            curr.kesp,
            curr.kernel_running,
        );

        new.cr3 = kvirt_to_phys(pgdir);
        new.pgdir = pgdir;
        new.kstack = kstack;

        Ok(())
    }

    /// Releases `proc`'s kernel stack and page directory. The caller
    /// guarantees every user page was freed first (regions detached).
    pub fn dstrypgdir(&mut self, proc: &Process) {
        self.release_kpage(proc.kstack);
        self.release_kpage(proc.pgdir);
    }
}

// ============================================================================
// Lazy Materialization
// ============================================================================

impl Mm {
    /// Installs a fresh zeroed frame under `addr` in `proc`'s address
    /// space. The covering page table must already be mapped.
    pub(crate) fn allocupg(
        &mut self,
        proc: &Process,
        addr: Vaddr,
        writable: bool,
    ) -> Result<(), MmError> {
        let frame = self.frames.alloc().ok_or(MmError::OutOfFrames)?;
        let addr = addr & PAGE_MASK;

        let mut pg = self.pte(proc, addr);
        pg.assign(writable);
        pg.set_frame(frame);
        self.set_pte(proc, addr, pg);
        self.tlb.flush();

        self.phys.frame_mut(frame).fill(0);

        Ok(())
    }

    /// Materializes the page under `addr` from `reg`'s backing file.
    ///
    /// A short read is success: the tail of the page keeps the zeros
    /// `allocupg` wrote, which is exactly what a file tail shorter than
    /// the region wants.
    pub(crate) fn readpg(
        &mut self,
        reg: &Region,
        proc: &Process,
        addr: Vaddr,
    ) -> Result<(), MmError> {
        let addr = addr & PAGE_MASK;

        self.allocupg(proc, addr, reg.mode().contains(Mode::MAY_WRITE))?;

        let file = match reg.file() {
            Some(file) => file,
            None => panic!("mm: demand fill with no backing file"),
        };
        let off = file.off + ((pte_index(addr) as u64) << PAGE_SHIFT);
        let inode = file.inode.clone();

        let pg = self.pte(proc, addr);
        let buf = self.phys.frame_mut(pg.frame());

        if inode.read_at(off, buf).is_err() {
            let tab = self.pgtab_kv(proc, addr);
            let pg = &mut PageTable::of_page_mut(self.phys.kpage_mut(tab))[pte_index(addr)];
            freeupg(&mut self.frames, &mut self.tlb, pg);
            return Err(MmError::Io);
        }

        Ok(())
    }

    /// Breaks copy-on-write on the page under `addr`, giving `proc` a
    /// private, writable copy. The PTE is untouched on failure.
    pub(crate) fn cow_break(&mut self, proc: &Process, addr: Vaddr) -> Result<(), MmError> {
        let mut pg = self.pte(proc, addr);
        cow_disable(&mut self.frames, &mut self.phys, &mut self.tlb, &mut pg)?;
        self.set_pte(proc, addr, pg);
        Ok(())
    }
}

// ============================================================================
// PTE Operations
// ============================================================================

/// Releases the user page behind `pg`.
///
/// Clear entries are a no-op; demand entries are dropped without touching
/// the frame pool; present entries release their frame reference. The
/// frame reference drops only after the entry is cleared and flushed.
pub fn freeupg(frames: &mut FrameTable, tlb: &mut Tlb, pg: &mut Pte) {
    if pg.is_clear() {
        return;
    }

    if !pg.is_present() {
        if pg.is_fill() || pg.is_zero() {
            pg.clear();
            tlb.flush();
            return;
        }
        panic!("mm: freeing invalid user page");
    }

    let frame = pg.frame();
    pg.clear();
    tlb.flush();
    frames.free(frame);
}

/// Stamps a demand state on `pg`.
///
/// # Panics
///
/// Marking a present page is a fatal invariant violation.
pub fn markpg(pg: &mut Pte, mark: PageMark) {
    if pg.is_present() {
        panic!("mm: demand mark on a present page");
    }

    match mark {
        PageMark::Fill => {
            pg.set_fill(true);
            pg.set_zero(false);
        }
        PageMark::Zero => {
            pg.set_fill(false);
            pg.set_zero(true);
        }
    }
}

/// Duplicates `src` into `dst` for a second address space.
///
/// Demand entries copy verbatim. A present, writable entry is first
/// demoted to copy-on-write so both sides see a read-only shared frame;
/// either way the frame gains a reference. The caller flushes the TLB
/// after the batch when `src` belongs to the current address space.
pub fn linkupg(frames: &mut FrameTable, src: &mut Pte, dst: &mut Pte) {
    if src.is_clear() {
        return;
    }

    if !src.is_present() {
        if src.is_fill() || src.is_zero() {
            *dst = *src;
            return;
        }
        panic!("mm: linking invalid user page");
    }

    if src.is_write() {
        cow_enable(src);
    }

    frames.share(src.frame());
    *dst = *src;
}

// ============================================================================
// Copy-On-Write
// ============================================================================

fn cow_enable(pg: &mut Pte) {
    pg.set_cow(true);
    pg.set_write(false);
}

pub(crate) fn cow_enabled(pg: &Pte) -> bool {
    pg.is_cow() && !pg.is_write()
}

/// Makes `pg` privately writable. If its frame is shared the contents move
/// to a fresh frame first; the last holder just takes the frame back.
fn cow_disable(
    frames: &mut FrameTable,
    phys: &mut PhysMem,
    tlb: &mut Tlb,
    pg: &mut Pte,
) -> Result<(), MmError> {
    if frames.is_shared(pg.frame()) {
        let mut new_pg = Pte::new();
        cpypg(frames, phys, &mut new_pg, pg)?;

        // Point the entry at the private copy before dropping the old
        // frame reference.
        let old = pg.frame();
        *pg = new_pg;
        frames.free(old);
    }

    pg.set_cow(false);
    pg.set_write(true);
    tlb.flush();

    Ok(())
}

/// Copies the page behind `src` into a fresh frame and builds `dst` as the
/// entry mapping it. The source page is in-core.
fn cpypg(
    frames: &mut FrameTable,
    phys: &mut PhysMem,
    dst: &mut Pte,
    src: &Pte,
) -> Result<(), MmError> {
    let frame = frames.alloc().ok_or(MmError::OutOfFrames)?;

    dst.copy_flags(src);
    dst.set_frame(frame);

    phys.physcpy(
        frame << PAGE_SHIFT,
        src.frame() << PAGE_SHIFT,
        PAGE_SIZE,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{Inode, IoError, RamInode};
    use crate::types::Pid;
    use alloc::sync::Arc;
    use alloc::vec;

    fn fixture() -> (Mm, Process) {
        let mut mm = Mm::new();
        let root = mm.bootstrap(Pid::IDLE).unwrap();
        (mm, root)
    }

    /// Maps a fresh user page table over `addr`.
    fn map_table(mm: &mut Mm, proc: &Process, addr: Vaddr) -> Vaddr {
        let pgtab = mm.acquire_kpage(true).unwrap();
        mm.mappgtab(proc, addr, pgtab);
        pgtab
    }

    #[test]
    fn mappgtab_then_umappgtab() {
        let (mut mm, root) = fixture();

        map_table(&mut mm, &root, 0x4000_0000);
        assert!(!mm.pde(&root, 0x4000_0000).is_clear());

        mm.umappgtab(&root, 0x4000_0000);
        assert!(mm.pde(&root, 0x4000_0000).is_clear());
    }

    #[test]
    fn mappgtab_flushes_only_for_current() {
        let (mut mm, root) = fixture();
        let mut other = Process::new(Pid::new());
        mm.crtpgdir(&root, &mut other).unwrap();

        let before = mm.tlb.flushes();
        map_table(&mut mm, &other, 0x4000_0000);
        assert_eq!(mm.tlb.flushes(), before);

        map_table(&mut mm, &root, 0x4000_0000);
        assert_eq!(mm.tlb.flushes(), before + 1);
    }

    #[test]
    #[should_panic(expected = "busy page directory entry")]
    fn mappgtab_over_live_table_is_fatal() {
        let (mut mm, root) = fixture();
        map_table(&mut mm, &root, 0x4000_0000);
        map_table(&mut mm, &root, 0x4000_0000);
    }

    #[test]
    #[should_panic(expected = "not mapped")]
    fn umappgtab_of_clear_slot_is_fatal() {
        let (mut mm, root) = fixture();
        mm.umappgtab(&root, 0x4000_0000);
    }

    #[test]
    fn crtpgdir_mirrors_kernel_slots() {
        let (mut mm, root) = fixture();
        let mut child = Process::new(Pid::new());
        mm.crtpgdir(&root, &mut child).unwrap();

        for va in [0, KBASE_VIRT, KPOOL_VIRT, INITRD_VIRT] {
            assert_eq!(mm.pde(&child, va), mm.pde(&root, va));
        }
        // User half stays clear until the region layer fills it.
        assert!(mm.pde(&child, 0x4000_0000).is_clear());
        assert_eq!(child.cr3, kvirt_to_phys(child.pgdir));
    }

    #[test]
    fn crtpgdir_clones_kstack_and_rebases_kesp() {
        let (mut mm, mut root) = fixture();
        root.kesp = root.kstack + 0x200;
        mm.phys.kpage_mut(root.kstack)[0x200] = 0x5A;

        let mut child = Process::new(Pid::new());
        mm.crtpgdir(&root, &mut child).unwrap();

        assert_eq!(child.kesp, child.kstack + 0x200);
        assert_eq!(mm.phys.kpage(child.kstack)[0x200], 0x5A);
    }

    #[test]
    fn crtpgdir_rebases_saved_frame_pointer_when_in_kernel() {
        let (mut mm, mut root) = fixture();
        let frame_off = (KSTACK_SIZE - core::mem::size_of::<crate::hal::IntStack>()) as Vaddr;
        root.kesp = root.kstack + frame_off;
        root.kernel_running = true;
        mm.phys.intstack_mut(root.kesp).ebp = root.kstack + 0x400;

        let mut child = Process::new(Pid::new());
        mm.crtpgdir(&root, &mut child).unwrap();

        assert_eq!(child.kesp, child.kstack + frame_off);
        assert_eq!(mm.phys.intstack(child.kesp).ebp, child.kstack + 0x400);
    }

    #[test]
    fn crtpgdir_unwinds_on_pool_exhaustion() {
        let (mut mm, root) = fixture();

        // Drain the pool down to a single page: the kstack acquire fails.
        let mut held = vec![];
        while mm.kpool.free_pages() > 1 {
            held.push(mm.acquire_kpage(false).unwrap());
        }

        let mut child = Process::new(Pid::new());
        assert_eq!(
            mm.crtpgdir(&root, &mut child),
            Err(MmError::OutOfKernelPages)
        );
        assert_eq!(mm.kpool.free_pages(), 1);

        for kpg in held {
            mm.release_kpage(kpg);
        }
    }

    #[test]
    fn dstrypgdir_returns_both_kernel_pages() {
        let (mut mm, root) = fixture();
        let free = mm.kpool.free_pages();

        let mut child = Process::new(Pid::new());
        mm.crtpgdir(&root, &mut child).unwrap();
        assert_eq!(mm.kpool.free_pages(), free - 2);

        mm.dstrypgdir(&child);
        assert_eq!(mm.kpool.free_pages(), free);
    }

    #[test]
    fn allocupg_installs_a_zeroed_writable_page() {
        let (mut mm, root) = fixture();
        map_table(&mut mm, &root, 0x4000_0000);

        let flushes = mm.tlb.flushes();
        mm.allocupg(&root, 0x4000_5123, true).unwrap();

        let pg = mm.pte(&root, 0x4000_5000);
        assert!(pg.is_present() && pg.is_write() && pg.is_user());
        assert!(!pg.is_cow() && !pg.is_fill() && !pg.is_zero());
        assert_eq!(mm.frames.refcount(pg.frame()), 1);
        assert!(mm.phys.frame(pg.frame()).iter().all(|&b| b == 0));
        assert!(mm.tlb.flushes() > flushes);
    }

    #[test]
    fn allocupg_propagates_frame_exhaustion() {
        let (mut mm, root) = fixture();
        map_table(&mut mm, &root, 0x4000_0000);

        while mm.frames.alloc().is_some() {}
        let before = mm.pte(&root, 0x4000_0000);
        assert_eq!(
            mm.allocupg(&root, 0x4000_0000, true),
            Err(MmError::OutOfFrames)
        );
        assert_eq!(mm.pte(&root, 0x4000_0000), before);
    }

    #[test]
    fn readpg_fills_from_file_and_zeroes_tail() {
        let (mut mm, root) = fixture();
        map_table(&mut mm, &root, 0x5000_0000);

        let mut data = vec![0u8; PAGE_SIZE + 7];
        data[PAGE_SIZE] = 0x11;
        data[PAGE_SIZE + 6] = 0x77;
        let inode: Arc<dyn Inode> = Arc::new(RamInode::new(data));
        let reg = Region::file_backed(Mode::MAY_READ, inode, 0, 2 * PAGE_SIZE);

        // Second page of the mapping: bytes [PAGE_SIZE, 2*PAGE_SIZE), of
        // which the file only has seven.
        mm.readpg(&reg, &root, 0x5000_1000).unwrap();

        let pg = mm.pte(&root, 0x5000_1000);
        assert!(pg.is_present());
        assert!(!pg.is_write());
        let page = mm.phys.frame(pg.frame());
        assert_eq!(page[0], 0x11);
        assert_eq!(page[6], 0x77);
        assert!(page[7..].iter().all(|&b| b == 0));
    }

    struct BadInode;

    impl Inode for BadInode {
        fn read_at(&self, _off: u64, _buf: &mut [u8]) -> Result<usize, IoError> {
            Err(IoError)
        }
    }

    #[test]
    fn readpg_unwinds_on_read_failure() {
        let (mut mm, root) = fixture();
        map_table(&mut mm, &root, 0x5000_0000);

        let free = mm.frames.free_frames();
        let reg = Region::file_backed(Mode::MAY_READ, Arc::new(BadInode), 0, PAGE_SIZE);

        assert_eq!(mm.readpg(&reg, &root, 0x5000_0000), Err(MmError::Io));
        assert!(mm.pte(&root, 0x5000_0000).is_clear());
        assert_eq!(mm.frames.free_frames(), free);
    }

    #[test]
    fn markpg_switches_between_demand_states() {
        let mut pg = Pte::new();

        markpg(&mut pg, PageMark::Fill);
        assert!(pg.is_fill() && !pg.is_zero());

        markpg(&mut pg, PageMark::Zero);
        assert!(pg.is_zero() && !pg.is_fill());
    }

    #[test]
    #[should_panic(expected = "demand mark on a present page")]
    fn markpg_on_present_page_is_fatal() {
        let mut pg = Pte::new();
        pg.assign(true);
        markpg(&mut pg, PageMark::Fill);
    }

    #[test]
    fn freeupg_on_clear_entry_is_a_no_op() {
        let mut frames = FrameTable::new();
        let mut tlb = Tlb::new();
        let mut pg = Pte::new();

        freeupg(&mut frames, &mut tlb, &mut pg);
        assert_eq!(tlb.flushes(), 0);
        assert_eq!(frames.free_frames(), crate::mm::frame::NR_FRAMES);
    }

    #[test]
    fn marked_page_frees_without_touching_frames() {
        let mut frames = FrameTable::new();
        let mut tlb = Tlb::new();
        let mut pg = Pte::new();

        markpg(&mut pg, PageMark::Fill);
        freeupg(&mut frames, &mut tlb, &mut pg);

        assert!(pg.is_clear());
        assert_eq!(frames.free_frames(), crate::mm::frame::NR_FRAMES);
        assert_eq!(tlb.flushes(), 1);
    }

    #[test]
    fn linkupg_shares_and_write_protects() {
        let mut frames = FrameTable::new();
        let frame = frames.alloc().unwrap();

        let mut src = Pte::new();
        src.assign(true);
        src.set_frame(frame);
        let mut dst = Pte::new();

        linkupg(&mut frames, &mut src, &mut dst);

        assert!(cow_enabled(&src) && cow_enabled(&dst));
        assert_eq!(dst.frame(), frame);
        assert_eq!(frames.refcount(frame), 2);
    }

    #[test]
    fn linkupg_copies_demand_entries_verbatim() {
        let mut frames = FrameTable::new();

        let mut src = Pte::new();
        markpg(&mut src, PageMark::Zero);
        let mut dst = Pte::new();

        linkupg(&mut frames, &mut src, &mut dst);
        assert_eq!(dst, src);

        let mut clear = Pte::new();
        let mut dst = Pte::new();
        markpg(&mut dst, PageMark::Fill);
        linkupg(&mut frames, &mut clear, &mut dst);
        assert!(dst.is_fill(), "clear source must leave dst untouched");
    }

    #[test]
    fn linkupg_then_freeupg_balances_the_refcount() {
        let mut frames = FrameTable::new();
        let mut tlb = Tlb::new();
        let frame = frames.alloc().unwrap();

        let mut src = Pte::new();
        src.assign(true);
        src.set_frame(frame);
        let mut dst = Pte::new();

        linkupg(&mut frames, &mut src, &mut dst);
        freeupg(&mut frames, &mut tlb, &mut dst);
        assert_eq!(frames.refcount(frame), 1);

        freeupg(&mut frames, &mut tlb, &mut src);
        assert_eq!(frames.refcount(frame), 0);
    }

    #[test]
    fn cow_disable_copies_shared_frames() {
        let mut mm = Mm::new();
        let frame = mm.frames.alloc().unwrap();
        mm.phys.frame_mut(frame)[42] = 0xBE;

        let mut src = Pte::new();
        src.assign(true);
        src.set_frame(frame);
        let mut dst = Pte::new();
        linkupg(&mut mm.frames, &mut src, &mut dst);

        cow_disable(&mut mm.frames, &mut mm.phys, &mut mm.tlb, &mut src).unwrap();

        assert!(src.is_write() && !src.is_cow());
        assert_ne!(src.frame(), frame);
        assert_eq!(mm.phys.frame(src.frame())[42], 0xBE);
        assert_eq!(mm.frames.refcount(frame), 1);
        assert_eq!(mm.frames.refcount(src.frame()), 1);
        // The other holder still sees the original, copy-on-write.
        assert!(cow_enabled(&dst));
        assert_eq!(dst.frame(), frame);
    }

    #[test]
    fn cow_disable_reclaims_an_exclusive_frame() {
        let mut mm = Mm::new();
        let frame = mm.frames.alloc().unwrap();

        let mut pg = Pte::new();
        pg.assign(false);
        pg.set_cow(true);
        pg.set_frame(frame);

        cow_disable(&mut mm.frames, &mut mm.phys, &mut mm.tlb, &mut pg).unwrap();

        assert!(pg.is_write() && !pg.is_cow());
        assert_eq!(pg.frame(), frame);
        assert_eq!(mm.frames.refcount(frame), 1);
    }
}
