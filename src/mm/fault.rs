//! Page fault handling.
//!
//! Two handlers, dispatched by the trap layer:
//!
//! - [`Mm::vfault`] resolves **validity faults** (access to a non-present
//!   page): demand-fill from the region's backing file, demand-zero, or
//!   downward stack growth when the access lands one page below the stack
//!   region.
//! - [`Mm::pfault`] resolves **protection faults** (write to a read-only
//!   page) by breaking copy-on-write.
//!
//! Both hold the region lock for the duration, which serializes
//! concurrent faults on the same region across the blocking file read. On
//! failure the tables are left exactly as they were; the trap layer turns
//! the error into a signal or kills the process — the memory core never
//! does.

use crate::hal::PAGE_SIZE;
use crate::mm::paging::cow_enabled;
use crate::mm::{Mm, MmError};
use crate::process::Process;
use crate::region::{self, Mode, PRegion, PREG_STACK};
use crate::types::Vaddr;

impl Mm {
    /// Handles a validity fault at `addr` in `proc`'s address space.
    pub fn vfault(&mut self, proc: &Process, addr: Vaddr) -> Result<(), MmError> {
        self.stats.vfaults += 1;

        let (preg, grow) = match region::findreg(proc, addr) {
            Some(slot) => (clone_preg(proc, slot), false),
            None => {
                // One page below the stack region means the stack wants to
                // grow downward; anything else is a bad address.
                let probe = addr.wrapping_add(PAGE_SIZE as Vaddr);
                let slot = region::findreg(proc, probe).ok_or(MmError::NoRegion)?;
                if slot != PREG_STACK {
                    return Err(MmError::NoRegion);
                }
                (clone_preg(proc, slot), true)
            }
        };

        let mut reg = preg.region.lock();

        if grow {
            region::growreg(self, &preg, &mut reg, PAGE_SIZE)?;
        }

        let pg = self.pte(proc, addr);
        if pg.is_fill() {
            self.readpg(&reg, proc, addr)?;
            self.stats.file_fills += 1;
        } else if pg.is_zero() {
            self.allocupg(proc, addr, reg.mode().contains(Mode::MAY_WRITE))?;
            self.stats.zero_fills += 1;
        } else {
            // Not a demand page: genuine bad access.
            return Err(MmError::BadAccess);
        }

        Ok(())
    }

    /// Handles a protection fault at `addr` in `proc`'s address space.
    pub fn pfault(&mut self, proc: &Process, addr: Vaddr) -> Result<(), MmError> {
        self.stats.pfaults += 1;

        let slot = region::findreg(proc, addr).ok_or(MmError::NoRegion)?;
        let preg = clone_preg(proc, slot);
        let _reg = preg.region.lock();

        let pg = self.pte(proc, addr);
        if !cow_enabled(&pg) {
            return Err(MmError::BadAccess);
        }

        self.cow_break(proc, addr)?;
        self.stats.cow_breaks += 1;

        Ok(())
    }
}

fn clone_preg(proc: &Process, slot: usize) -> PRegion {
    proc.pregions[slot]
        .as_ref()
        .expect("mm: fault against an empty region slot")
        .clone()
}
