//! Property tests over the allocator and PTE invariants.

use proptest::prelude::*;

use kernel_mm::hal::{PhysMem, Tlb};
use kernel_mm::mm::{freeupg, linkupg, markpg, FrameTable, KernelPool, PageMark, Pte};
use kernel_mm::mm::{NR_FRAMES, NR_KPAGES};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Pages held plus pages free always add up to the pool size, and
    /// releasing everything restores a full pool.
    #[test]
    fn kernel_pool_conserves_pages(ops in prop::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 1..120)) {
        let mut phys = PhysMem::new();
        let mut pool = KernelPool::new();
        let mut held: Vec<u32> = Vec::new();

        for (acquire, pick) in ops {
            if acquire {
                if let Some(kpg) = pool.acquire(&mut phys, false) {
                    held.push(kpg);
                }
            } else if !held.is_empty() {
                let kpg = held.swap_remove(pick.index(held.len()));
                pool.release(kpg);
            }

            prop_assert_eq!(held.len() + pool.free_pages(), NR_KPAGES);
        }

        for kpg in held.drain(..) {
            pool.release(kpg);
        }
        prop_assert_eq!(pool.free_pages(), NR_KPAGES);
    }

    /// A clean acquisition hands out an all-zero page no matter what the
    /// previous owner left behind.
    #[test]
    fn clean_kernel_pages_carry_no_garbage(junk in prop::collection::vec(1u8..=255, 1..64)) {
        let mut phys = PhysMem::new();
        let mut pool = KernelPool::new();

        let kpg = pool.acquire(&mut phys, false).unwrap();
        for (i, b) in junk.iter().enumerate() {
            phys.kpage_mut(kpg)[i * 61 % 4096] = *b;
        }
        pool.release(kpg);

        let kpg = pool.acquire(&mut phys, true).unwrap();
        prop_assert!(phys.kpage(kpg).iter().all(|&b| b == 0));
    }

    /// A frame's reference count always equals the number of live PTEs
    /// that map it.
    #[test]
    fn frame_refcount_tracks_live_links(links in 1..24usize, freed in 0..24usize) {
        let mut frames = FrameTable::new();
        let mut tlb = Tlb::new();

        let frame = frames.alloc().unwrap();
        let mut src = Pte::new();
        src.assign(true);
        src.set_frame(frame);

        let mut dsts = Vec::new();
        for _ in 0..links {
            let mut dst = Pte::new();
            linkupg(&mut frames, &mut src, &mut dst);
            prop_assert_eq!(dst.frame(), frame);
            dsts.push(dst);
        }
        prop_assert_eq!(frames.refcount(frame) as usize, links + 1);

        let freed = freed.min(links);
        for dst in dsts.iter_mut().take(freed) {
            freeupg(&mut frames, &mut tlb, dst);
            prop_assert!(dst.is_clear());
        }
        prop_assert_eq!(frames.refcount(frame) as usize, links + 1 - freed);

        for dst in dsts.iter_mut().skip(freed) {
            freeupg(&mut frames, &mut tlb, dst);
        }
        freeupg(&mut frames, &mut tlb, &mut src);
        prop_assert_eq!(frames.refcount(frame), 0);
        prop_assert_eq!(frames.free_frames(), NR_FRAMES);
    }

    /// Demand marks are exclusive and never make a page present, and a
    /// marked page releases without touching the frame pool.
    #[test]
    fn demand_marks_stay_exclusive(marks in prop::collection::vec(any::<bool>(), 1..32)) {
        let mut frames = FrameTable::new();
        let mut tlb = Tlb::new();
        let mut pg = Pte::new();

        for fill in marks {
            markpg(&mut pg, if fill { PageMark::Fill } else { PageMark::Zero });
            prop_assert!(pg.is_fill() != pg.is_zero());
            prop_assert!(!pg.is_present());
        }

        freeupg(&mut frames, &mut tlb, &mut pg);
        prop_assert!(pg.is_clear());
        prop_assert_eq!(frames.free_frames(), NR_FRAMES);
    }
}
