//! Virtual memory manager: two-level x86 paging with a recursive page
//! directory self-map.
//!
//! The active page directory always exposes itself at [`layout::PD`] and its
//! page tables back-to-back at [`layout::PTS`] (page directory entry 1023
//! points at the page directory itself). Every operation here reads and
//! writes through those fixed virtual addresses rather than walking physical
//! memory directly, so it always operates on whichever address space is
//! currently loaded into CR3.

use crate::arch::x86::primitives;
use crate::memory::address::{PhysAddr, VirtAddr};
use crate::memory::layout;
use crate::memory::physical;
use bitflags::bitflags;

bitflags! {
    /// Page table / page directory entry flags. The low three bits are
    /// hardware-defined; `ALLOCATED` is a software bit tracking whether the
    /// VMM owns the backing frame and must free it on unmap.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const PRESENT   = 1 << 0;
        const WRITE     = 1 << 1;
        const USER      = 1 << 2;
        const PAGE_4MB  = 1 << 7;
        const GLOBAL    = 1 << 8;
        const ALLOCATED = 1 << 9;
    }
}

const FRAME_MASK: u32 = !(primitives::PAGE_SIZE - 1);

#[inline]
fn pd_entry(index: usize) -> u32 {
    unsafe { core::ptr::read_volatile((layout::PD as *const u32).add(index)) }
}

#[inline]
fn set_pd_entry(index: usize, value: u32) {
    unsafe { core::ptr::write_volatile((layout::PD as *mut u32).add(index), value) };
}

#[inline]
fn pt_entry(pd_index: usize, pt_index: usize) -> u32 {
    let base = layout::PTS + (pd_index * layout::ENTRIES_PER_TABLE * 4) as u32;
    unsafe { core::ptr::read_volatile((base as *const u32).add(pt_index)) }
}

#[inline]
fn set_pt_entry(pd_index: usize, pt_index: usize, value: u32) {
    let base = layout::PTS + (pd_index * layout::ENTRIES_PER_TABLE * 4) as u32;
    unsafe { core::ptr::write_volatile((base as *mut u32).add(pt_index), value) };
}

/// Virtual address of the page table backing page directory entry
/// `pd_index`, as exposed by the recursive self-map.
#[inline]
fn pt_self_address(pd_index: usize) -> u32 {
    layout::PTS + (pd_index * layout::FRAME_SIZE_USIZE) as u32
}

/// Look up the physical frame backing `v`, without checking the `PRESENT`
/// bit of the page table entry (matching the kernel's informal contract:
/// callers that care about presence check it themselves).
pub fn virtual_to_physical(v: VirtAddr) -> Option<PhysAddr> {
    let pdi = layout::pd_index(v.as_u32());
    let pde = pd_entry(pdi);
    if pde & PteFlags::PRESENT.bits() == 0 {
        return None;
    }
    let pti = layout::pt_index(v.as_u32());
    let pte = pt_entry(pdi, pti);
    Some(PhysAddr::new((pte & FRAME_MASK) | (v.as_u32() & !FRAME_MASK & 0xFFF)))
}

/// Map one page at `v`. If `phys` is `Some`, the caller-supplied frame is
/// installed and ownership stays with the caller (`ALLOCATED` is cleared).
/// If `phys` is `None`, the VMM allocates (or reuses a previously-owned)
/// frame and marks it `ALLOCATED`.
pub fn map(v: VirtAddr, phys: Option<PhysAddr>, flags: PteFlags) {
    assert!(v.as_u32() >= layout::IDENTITY, "cannot remap the identity region");

    let pdi = layout::pd_index(v.as_u32());
    let pti = layout::pt_index(v.as_u32());

    if pd_entry(pdi) & PteFlags::PRESENT.bits() == 0 {
        let pt_frame = physical::allocate();
        let pde = pt_frame.as_u32()
            | (PteFlags::PRESENT | PteFlags::WRITE | PteFlags::USER).bits();
        set_pd_entry(pdi, pde);
        unsafe { primitives::invlpg(pt_self_address(pdi)) };
        let pt_base = pt_self_address(pdi) as *mut u8;
        unsafe { core::ptr::write_bytes(pt_base, 0, layout::FRAME_SIZE_USIZE) };
    }

    let existing = pt_entry(pdi, pti);
    let new_entry = match phys {
        Some(p) => {
            if existing & PteFlags::ALLOCATED.bits() != 0 {
                physical::free(PhysAddr::new(existing & FRAME_MASK));
            }
            p.frame_align_down().as_u32() | flags.bits() | PteFlags::PRESENT.bits()
        }
        None => {
            if existing & PteFlags::ALLOCATED.bits() != 0 {
                (existing & FRAME_MASK) | flags.bits() | PteFlags::PRESENT.bits() | PteFlags::ALLOCATED.bits()
            } else {
                let frame = physical::allocate();
                frame.as_u32() | flags.bits() | PteFlags::PRESENT.bits() | PteFlags::ALLOCATED.bits()
            }
        }
    };
    set_pt_entry(pdi, pti, new_entry);
    unsafe { primitives::invlpg(v.as_u32()) };
}

/// Unmap one page at `v`, freeing its frame if the VMM owns it.
pub fn unmap(v: VirtAddr) {
    assert!(v.as_u32() >= layout::IDENTITY, "cannot unmap the identity region");

    let pdi = layout::pd_index(v.as_u32());
    if pd_entry(pdi) & PteFlags::PRESENT.bits() == 0 {
        return;
    }
    let pti = layout::pt_index(v.as_u32());
    let existing = pt_entry(pdi, pti);
    if existing & PteFlags::ALLOCATED.bits() != 0 {
        physical::free(PhysAddr::new(existing & FRAME_MASK));
    }
    set_pt_entry(pdi, pti, 0);
    unsafe { primitives::invlpg(v.as_u32()) };
}

/// Map `size` bytes starting at `v`, striding the physical address in
/// lockstep with `phys` when it is `Some`.
pub fn map_zone(v: VirtAddr, phys: Option<PhysAddr>, size: u32, flags: PteFlags) {
    let mut offset = 0u32;
    while offset < size {
        let page_phys = phys.map(|p| PhysAddr::new(p.as_u32() + offset));
        map(VirtAddr::new(v.as_u32() + offset), page_phys, flags);
        offset += primitives::PAGE_SIZE;
    }
}

/// Unmap `size` bytes starting at `v`.
pub fn unmap_zone(v: VirtAddr, size: u32) {
    let mut offset = 0u32;
    while offset < size {
        unmap(VirtAddr::new(v.as_u32() + offset));
        offset += primitives::PAGE_SIZE;
    }
}

/// Allocate a new address space: a page directory sharing the kernel's
/// mappings and privately recursively self-mapped.
pub fn create_address_space() -> PhysAddr {
    let pd_frame = physical::allocate();

    map(VirtAddr::new(layout::TMP), Some(pd_frame), PteFlags::WRITE);
    let tmp = layout::TMP as *mut u32;
    unsafe { core::ptr::write_bytes(tmp as *mut u8, 0, layout::FRAME_SIZE_USIZE) };

    let user_index = layout::user_pd_index();
    for i in 0..user_index {
        let entry = pd_entry(i);
        unsafe { core::ptr::write_volatile(tmp.add(i), entry) };
    }
    unsafe {
        core::ptr::write_volatile(
            tmp.add(layout::RECURSIVE_INDEX),
            pd_frame.as_u32() | (PteFlags::PRESENT | PteFlags::WRITE).bits(),
        )
    };

    unmap(VirtAddr::new(layout::TMP));

    log::debug!("vmm: created address space, pd={:#010x}", pd_frame.as_u32());
    pd_frame
}

/// Tear down every userspace mapping in the currently active address space.
/// Must be called while the space being destroyed is the one loaded in CR3.
/// The recursive self-map (entry 1023) is left intact.
pub fn destroy_address_space() {
    let user_index = layout::user_pd_index();
    for i in user_index..layout::RECURSIVE_INDEX {
        if pd_entry(i) & PteFlags::PRESENT.bits() != 0 {
            unmap_zone(VirtAddr::new((i as u32) * layout::PD_ENTRY_SPAN), layout::PD_ENTRY_SPAN);
        }
    }
    log::debug!("vmm: destroyed address space");
}

/// Decoded page-fault error code fields, as laid out by the CPU on the
/// exception stack frame.
pub struct FaultInfo {
    pub address: u32,
    pub present: bool,
    pub write: bool,
    pub user: bool,
}

/// Handle a page fault: `error_code` is the CPU-pushed error code, `cr2` the
/// faulting linear address. Returns `true` if the fault was the cooperative
/// thread-destroy signal and the caller should destroy the current thread
/// instead of treating this as an error.
pub fn page_fault(cr2: u32, error_code: u32) -> FaultInfo {
    if cr2 == layout::THREAD_DESTROY {
        log::debug!("vmm: thread-destroy fault received");
    }
    FaultInfo {
        address: cr2,
        present: error_code & 0x1 != 0,
        write: error_code & 0x2 != 0,
        user: error_code & 0x4 != 0,
    }
}

/// Install the kernel's own page directory: two 4 MiB global identity pages
/// covering the first 8 MiB, and the recursive self-map at entry 1023. Then
/// enables paging.
pub fn initialize() {
    assert!(
        physical::stack_end() <= layout::IDENTITY,
        "pmem free-frame stack must fit below the identity-mapped region"
    );

    let pd_frame = physical::allocate();
    let pd_ptr = pd_frame.as_u32() as *mut u32;
    unsafe { core::ptr::write_bytes(pd_ptr as *mut u8, 0, layout::FRAME_SIZE_USIZE) };

    let identity_flags =
        (PteFlags::PRESENT | PteFlags::WRITE | PteFlags::PAGE_4MB | PteFlags::GLOBAL).bits();
    unsafe {
        core::ptr::write_volatile(pd_ptr.add(0), 0x0000_0000 | identity_flags);
        core::ptr::write_volatile(pd_ptr.add(1), 0x0040_0000 | identity_flags);
        core::ptr::write_volatile(
            pd_ptr.add(layout::RECURSIVE_INDEX),
            pd_frame.as_u32() | (PteFlags::PRESENT | PteFlags::WRITE).bits(),
        );
    }

    crate::interrupts::register(14, handle_page_fault_vector);

    unsafe { primitives::enable_paging(pd_frame.as_u32()) };

    log::info!("vmm: paging enabled, kernel pd={:#010x}", pd_frame.as_u32());
}

/// Vector-14 entry point registered with the interrupt subsystem.
fn handle_page_fault_vector(ctx: &crate::task::context::Context) {
    let cr2 = unsafe { primitives::read_cr2() };
    let info = page_fault(cr2, ctx.error_code);
    if info.address == layout::THREAD_DESTROY {
        crate::task::scheduler::destroy_current();
        return;
    }
    panic!(
        "page fault at {:#010x}: {}, {}, {}, eip={:#010x}",
        info.address,
        if info.present { "protection" } else { "not-present" },
        if info.write { "write" } else { "read" },
        if info.user { "user" } else { "kernel" },
        ctx.eip,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pte_flags_bit_positions_match_layout() {
        assert_eq!(PteFlags::PRESENT.bits(), 1 << 0);
        assert_eq!(PteFlags::WRITE.bits(), 1 << 1);
        assert_eq!(PteFlags::USER.bits(), 1 << 2);
        assert_eq!(PteFlags::PAGE_4MB.bits(), 1 << 7);
        assert_eq!(PteFlags::GLOBAL.bits(), 1 << 8);
        assert_eq!(PteFlags::ALLOCATED.bits(), 1 << 9);
    }

    #[test]
    fn pt_self_address_is_inside_pts_window() {
        let a = pt_self_address(0);
        let b = pt_self_address(1);
        assert_eq!(a, layout::PTS);
        assert_eq!(b - a, layout::FRAME_SIZE_USIZE as u32);
    }

    #[test]
    fn thread_destroy_sentinel_decodes_as_itself() {
        let info = page_fault(layout::THREAD_DESTROY, 0);
        assert_eq!(info.address, layout::THREAD_DESTROY);
    }
}
