//! Kernel entry point.
//!
//! Wires the four in-scope subsystems together in the order §2 lays out:
//! segmentation, the physical frame allocator, paging, then the scheduler.
//! The bootloader's assembly stub (out of scope) is expected to call
//! [`kernel_main`] with the physical address of the Multiboot info
//! structure, after having already loaded a GDT-free flat segment setup
//! sufficient to run 32-bit protected-mode code.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![allow(static_mut_refs)]

use nucleus_core::boot_info::BootInfo;
use nucleus_core::{arch, logging, memory, task};

/// Under a hosted target this binary has nothing to do — the real entry
/// point is [`kernel_main`], called by the bootloader's assembly stub on
/// the freestanding target. This stub only exists so `cargo test` can
/// build the `nucleus` binary target without a linker script.
#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn kernel_main(boot_info_addr: u32) -> ! {
    logging::init(log::Level::Trace);

    log::info!("==============================");
    log::info!("  kernel core bring-up");
    log::info!("==============================");

    let boot_info = unsafe { &*(boot_info_addr as *const BootInfo) };

    // Phase 1: segmentation. Installs the GDT, builds the TSS, and loads
    // the task register — must happen before any privilege transition.
    arch::x86::tss::init();

    // Phase 2: physical frame allocator, seeded from the bootloader's
    // memory map.
    memory::physical::initialize(boot_info);

    // Phase 3: paging. Installs the kernel identity map and recursive
    // self-map, registers the page-fault handler, and enables paging.
    memory::virtual_mem::initialize();

    // Phase 4: scheduler. Registers the tick handler with the (external)
    // timer driver; the first thread is admitted by the (external)
    // higher-level process/thread constructor layer, not here.
    task::scheduler::initialize();

    log::info!("core bring-up complete, {} bytes free", memory::physical::available());

    loop {
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}
