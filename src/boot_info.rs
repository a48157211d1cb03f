//! Multiboot boot information contract.
//!
//! The bootloader (out of scope here) hands the kernel a pointer to a
//! Multiboot information structure. This module only exposes the fields the
//! in-scope subsystems need: the upper-memory size, the memory map, and the
//! end of the last loaded module.

/// Multiboot info flags bit for `mem_lower`/`mem_upper` validity.
const FLAG_MEMORY: u32 = 1 << 0;
/// Multiboot info flags bit for the `mmap_*` fields' validity.
const FLAG_MEM_MAP: u32 = 1 << 6;
/// Multiboot info flags bit for the `mods_*` fields' validity.
const FLAG_MODULES: u32 = 1 << 3;

/// Memory region type reported by the bootloader: usable RAM.
pub const REGION_AVAILABLE: u32 = 1;

#[repr(C, packed)]
pub struct BootInfo {
    pub flags: u32,
    pub mem_lower: u32,
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
    _syms: [u32; 4],
    pub mmap_length: u32,
    pub mmap_addr: u32,
}

/// One Multiboot memory-map entry. `size` is the length of the entry body
/// that follows this field, not counting `size` itself — entries are
/// therefore walked with a variable stride, not `size_of::<MemoryMapEntry>()`.
#[repr(C, packed)]
#[derive(Copy, Clone)]
pub struct MemoryMapEntry {
    pub size: u32,
    pub addr: u64,
    pub len: u64,
    pub region_type: u32,
}

impl MemoryMapEntry {
    pub fn is_available(&self) -> bool {
        self.region_type == REGION_AVAILABLE
    }

    pub fn start(&self) -> u32 {
        self.addr as u32
    }

    pub fn end(&self) -> u32 {
        (self.addr + self.len) as u32
    }
}

#[repr(C, packed)]
struct ModuleEntry {
    mod_start: u32,
    mod_end: u32,
    _string: u32,
    _reserved: u32,
}

pub struct MemoryMapIter {
    cursor: u32,
    end: u32,
}

impl Iterator for MemoryMapIter {
    type Item = MemoryMapEntry;

    fn next(&mut self) -> Option<MemoryMapEntry> {
        if self.cursor >= self.end {
            return None;
        }
        let entry = unsafe { core::ptr::read_unaligned(self.cursor as *const MemoryMapEntry) };
        let size_field = unsafe { core::ptr::read_unaligned(self.cursor as *const u32) };
        self.cursor += size_field + core::mem::size_of::<u32>() as u32;
        Some(entry)
    }
}

impl BootInfo {
    pub fn has_memory_map(&self) -> bool {
        self.flags & FLAG_MEMORY != 0 && self.flags & FLAG_MEM_MAP != 0
    }

    /// Upper-memory size in KiB, as reported by the bootloader (memory above
    /// 1 MiB, excluding any holes — consumers must still honor the memory
    /// map for the exact set of usable regions).
    pub fn mem_upper_kib(&self) -> u32 {
        self.mem_upper
    }

    pub fn memory_map(&self) -> MemoryMapIter {
        MemoryMapIter {
            cursor: self.mmap_addr,
            end: self.mmap_addr + self.mmap_length,
        }
    }

    /// Highest physical address used by any bootloader module (e.g. the
    /// kernel's own initial page tables or any boot-time payload). The
    /// physical frame allocator reserves everything below this address.
    pub fn last_module_end(&self) -> u32 {
        if self.flags & FLAG_MODULES == 0 || self.mods_count == 0 {
            return 0;
        }
        let mut max_end = 0u32;
        for i in 0..self.mods_count {
            let addr = self.mods_addr + i * core::mem::size_of::<ModuleEntry>() as u32;
            let module = unsafe { core::ptr::read_unaligned(addr as *const ModuleEntry) };
            if module.mod_end > max_end {
                max_end = module.mod_end;
            }
        }
        max_end
    }
}
