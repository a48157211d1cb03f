//! Core memory and CPU-state subsystems of a small 32-bit protected-mode
//! kernel: segmentation (GDT/TSS), the physical frame allocator, the paging
//! layer (recursive self-mapped page tables), and the round-robin thread
//! scheduler.
//!
//! Everything else a booting kernel needs — the text console, IDT
//! construction and the ISR assembly trampoline, the timer driver's PIT/APIC
//! programming, Multiboot parsing, and the higher-level thread/process
//! constructors and syscall layer — is an external collaborator. This crate
//! only fixes the shape of the interfaces those collaborators are expected
//! to provide ([`interrupts`], [`timer`], [`boot_info`]) so the four
//! in-scope subsystems compile and can be exercised under a host test
//! harness.
//!
//! Built for `target_os = "none"` (a freestanding 32-bit x86 target); under
//! a hosted target (`cargo test`) the crate links against `std` instead so
//! the module test suites below can run as ordinary `#[test]`s.

#![no_std]
#![allow(static_mut_refs)]

#[cfg(not(target_os = "none"))]
extern crate std;

pub mod arch;
pub mod boot_info;
pub mod interrupts;
pub mod logging;
#[cfg(target_os = "none")]
pub mod panic;
pub mod memory;
pub mod task;
pub mod timer;
