//! Saved CPU context for context switching and interrupt return (i386).
//!
//! Mirrors the stack frame the (external) ISR trampoline builds: the
//! general-purpose registers it pushes by hand, followed by the `eip, cs,
//! eflags` (and `esp, ss`, present whenever the trap crossed from ring 3)
//! the CPU itself pushes on an interrupt. This is the same role the
//! teacher's 64-bit `CpuContext` plays for its trampoline, scaled down to
//! the i386 frame this kernel's ISR stub actually produces.
//!
//! Of all these fields only `eip` and `esp` carry semantics the scheduler
//! and VMM act on (restoring/inspecting where a thread was executing); the
//! rest exist purely to keep this struct's size matching the real
//! trampoline's frame. The third field the scheduler needs — the active
//! page directory — is *not* part of this frame; it lives on
//! [`crate::task::thread::Thread::page_directory`] instead, since CR3 is
//! process-wide state, not per-interrupt register state.

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    // Pushed by the ISR stub's manual `pushad`-equivalent, reverse order.
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// `esp` at the time of `pushad`; ignored on restore (real `esp` is
    /// either implicit or the `esp` field below, depending on ring).
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    // Pushed by the ISR stub itself before calling the common handler.
    pub vector: u32,
    pub error_code: u32,
    // Pushed by the CPU automatically on any interrupt/exception.
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    // Only present/meaningful when the trap originated in ring 3.
    pub esp: u32,
    pub ss: u32,
}

impl Context {
    /// An all-zero context, suitable as a placeholder before a thread has
    /// ever run.
    pub const fn zeroed() -> Self {
        Context {
            edi: 0,
            esi: 0,
            ebp: 0,
            esp_dummy: 0,
            ebx: 0,
            edx: 0,
            ecx: 0,
            eax: 0,
            vector: 0,
            error_code: 0,
            eip: 0,
            cs: 0,
            eflags: 0,
            esp: 0,
            ss: 0,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_context_has_all_fields_zero() {
        let ctx = Context::zeroed();
        assert_eq!(ctx.eip, 0);
        assert_eq!(ctx.esp, 0);
        assert_eq!(ctx.eax, 0);
    }

    #[test]
    fn size_is_fifteen_words() {
        assert_eq!(core::mem::size_of::<Context>(), 15 * core::mem::size_of::<u32>());
    }
}
