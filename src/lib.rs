//! Virtual memory core of a small UNIX-like kernel.
//!
//! This crate implements the three tightly coupled pieces of the kernel's
//! memory subsystem:
//!
//! - **Kernel page pool** ([`mm::kpool`]): page-sized, reference-counted
//!   kernel allocations backing page directories, page tables and kernel
//!   stacks.
//! - **Frame allocator** ([`mm::frame`]): reference-counted physical user
//!   frames, shared across address spaces by copy-on-write.
//! - **Paging engine** ([`mm::paging`], [`mm::fault`]): per-process page
//!   directories, demand fill/zero, copy-on-write and the validity and
//!   protection fault handlers.
//!
//! The [`region`] and [`fs`] modules carry the seams the engine consumes
//! (virtual-address regions and backing files); [`hal`] holds the machine
//! model. All state lives in the [`mm::Mm`] context, so the whole engine
//! runs unmodified under the host test harness.
//!
//! The kernel proper is single-CPU with preemption disabled across table
//! mutation; nothing here takes interior locks except region descriptors,
//! which are shared between fault handling and the region layer.

#![no_std]
// Kernel types have specialized initialization that doesn't fit Default.
#![allow(clippy::new_without_default)]
// Page arithmetic reads better with explicit shifts and casts.
#![allow(clippy::identity_op)]

extern crate alloc;

pub mod fs;
pub mod hal;
pub mod mm;
pub mod process;
pub mod region;
pub mod types;

pub use mm::{Mm, MmError, MmStats};
pub use process::Process;
