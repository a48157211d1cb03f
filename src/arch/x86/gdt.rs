//! Global Descriptor Table: six fixed entries (null, kernel/user code/data,
//! TSS) for a single-CPU 32-bit protected-mode kernel.
//!
//! GDT layout:
//!   0x00: Null
//!   0x08: Kernel Code (Ring 0)
//!   0x10: Kernel Data (Ring 0)
//!   0x18: User Code (Ring 3)
//!   0x20: User Data (Ring 3)
//!   0x28: TSS

use core::mem::size_of;

pub const NULL_SEL: u16 = 0x00;
pub const KERNEL_CODE_SEL: u16 = 0x08;
pub const KERNEL_DATA_SEL: u16 = 0x10;
pub const USER_CODE_SEL: u16 = 0x18;
pub const USER_DATA_SEL: u16 = 0x20;
pub const TSS_SEL: u16 = 0x28;

const ENTRY_COUNT: usize = 6;

#[repr(C, packed)]
#[derive(Copy, Clone)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    flags_limit_high: u8,
    base_high: u8,
}

#[repr(C, packed)]
struct GdtDescriptor {
    size: u16,
    offset: u32,
}

const ZERO_ENTRY: GdtEntry = GdtEntry {
    limit_low: 0,
    base_low: 0,
    base_mid: 0,
    access: 0,
    flags_limit_high: 0,
    base_high: 0,
};

static mut GDT: [GdtEntry; ENTRY_COUNT] = [ZERO_ENTRY; ENTRY_COUNT];
static mut GDT_DESC: GdtDescriptor = GdtDescriptor { size: 0, offset: 0 };

const fn make_entry(base: u32, limit: u32, access: u8, flags: u8) -> GdtEntry {
    GdtEntry {
        limit_low: (limit & 0xFFFF) as u16,
        base_low: (base & 0xFFFF) as u16,
        base_mid: ((base >> 16) & 0xFF) as u8,
        access,
        flags_limit_high: ((limit >> 16) & 0x0F) as u8 | (flags << 4),
        base_high: ((base >> 24) & 0xFF) as u8,
    }
}

/// Build the six entries this GDT always carries, independent of `static
/// mut` storage — used both by `init` and by tests that check the byte
/// layout without touching the real GDT.
const fn entries(tss_base: u32, tss_limit: u32) -> [GdtEntry; ENTRY_COUNT] {
    [
        make_entry(0, 0, 0, 0),
        make_entry(0, 0xFFFFF, 0x9A, 0xC),
        make_entry(0, 0xFFFFF, 0x92, 0xC),
        make_entry(0, 0xFFFFF, 0xFA, 0xC),
        make_entry(0, 0xFFFFF, 0xF2, 0xC),
        make_entry(tss_base, tss_limit, 0x89, 0x4),
    ]
}

/// Install the GDT for a given TSS base/limit and load it via `lgdt`,
/// reloading every segment register.
pub fn init(tss_base: u32, tss_limit: u32) {
    unsafe {
        GDT = entries(tss_base, tss_limit);
        GDT_DESC = GdtDescriptor {
            size: (ENTRY_COUNT * size_of::<GdtEntry>() - 1) as u16,
            offset: GDT.as_ptr() as u32,
        };
        load(&GDT_DESC);
    }
    log::info!("gdt: installed 6 entries, tss base={:#010x}", tss_base);
}

#[cfg(target_arch = "x86")]
unsafe fn load(desc: &GdtDescriptor) {
    core::arch::asm!(
        "lgdt [{desc}]",
        "mov ax, {kdata:x}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "mov ss, ax",
        "push {kcode}",
        "lea {tmp}, [2f]",
        "push {tmp}",
        "retf",
        "2:",
        desc = in(reg) desc as *const GdtDescriptor,
        kdata = in(reg) KERNEL_DATA_SEL as u32,
        kcode = in(reg) KERNEL_CODE_SEL as u32,
        tmp = out(reg) _,
        options(nostack),
    );
}

#[cfg(not(target_arch = "x86"))]
unsafe fn load(_desc: &GdtDescriptor) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_eight_byte_aligned_in_order() {
        assert_eq!(NULL_SEL, 0x00);
        assert_eq!(KERNEL_CODE_SEL, 0x08);
        assert_eq!(KERNEL_DATA_SEL, 0x10);
        assert_eq!(USER_CODE_SEL, 0x18);
        assert_eq!(USER_DATA_SEL, 0x20);
        assert_eq!(TSS_SEL, 0x28);
    }

    #[test]
    fn kernel_code_descriptor_matches_spec_table() {
        let gdt = entries(0x1000, 103);
        let e = gdt[1];
        assert_eq!(e.access, 0x9A);
        assert_eq!(e.flags_limit_high & 0xF0, 0xC0);
        assert_eq!(e.limit_low, 0xFFFF);
    }

    #[test]
    fn tss_descriptor_encodes_base_and_limit() {
        let gdt = entries(0x0012_3456, 103);
        let e = gdt[5];
        assert_eq!(e.access, 0x89);
        assert_eq!(e.limit_low, 103);
        assert_eq!(e.base_low, 0x3456);
        assert_eq!(e.base_mid, 0x12);
        assert_eq!(e.base_high, 0x00);
    }
}
