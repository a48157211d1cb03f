//! Minimal interrupt-subsystem interface.
//!
//! IDT construction, PIC/APIC remapping, and the ISR assembly trampoline
//! that builds a [`task::context::Context`](crate::task::context::Context)
//! out of the hardware-pushed exception frame are the external `isr`/
//! `interrupt` collaborator §6 places out of scope. This module only fixes
//! the two primitives the virtual memory manager and the scheduler consume:
//! a vector-indexed handler table (`register`, `dispatch`) and the
//! process-wide context pointer the interrupt-return epilogue reads to know
//! which thread to restore.

use crate::task::context::Context;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

/// Number of CPU interrupt vectors (0-31 exceptions, 32-255 IRQs/software).
pub const VECTOR_COUNT: usize = 256;

/// A kernel handler for one interrupt vector.
pub type Handler = fn(&Context);

static HANDLERS: Mutex<[Option<Handler>; VECTOR_COUNT]> = Mutex::new([None; VECTOR_COUNT]);

/// Context pointer the (external) interrupt-return epilogue restores from.
/// The scheduler rewrites it on every context switch; `0` means "none set".
static CURRENT_CONTEXT: AtomicUsize = AtomicUsize::new(0);

/// Install a kernel handler for `vector`, replacing any previous one.
/// The virtual memory manager registers vector 14 (page fault) here.
pub fn register(vector: u8, handler: Handler) {
    HANDLERS.lock()[vector as usize] = Some(handler);
}

/// Dispatch `vector` to its registered handler, if any. Called by the
/// (external) ISR trampoline once it has assembled `ctx` from the
/// hardware-pushed stack frame.
pub fn dispatch(vector: u8, ctx: &Context) {
    if let Some(handler) = HANDLERS.lock()[vector as usize] {
        handler(ctx);
    }
}

/// Point the interrupt-return epilogue at `ctx`. The scheduler calls this
/// from `contextSwitch` so the next `iret` restores the destination thread.
pub fn set_current_context(ctx: *const Context) {
    CURRENT_CONTEXT.store(ctx as usize, Ordering::SeqCst);
}

/// The context pointer currently installed, for the (external)
/// interrupt-return epilogue.
pub fn current_context() -> *const Context {
    CURRENT_CONTEXT.load(Ordering::SeqCst) as *const Context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler(_ctx: &Context) {}

    #[test]
    fn register_then_dispatch_invokes_handler() {
        use core::sync::atomic::AtomicBool;
        static CALLED: AtomicBool = AtomicBool::new(false);
        fn mark(_ctx: &Context) {
            CALLED.store(true, Ordering::SeqCst);
        }
        register(200, mark);
        let ctx = Context::zeroed();
        dispatch(200, &ctx);
        assert!(CALLED.load(Ordering::SeqCst));
        // clean up so other tests sharing this global table see a fresh slot
        HANDLERS.lock()[200] = None;
    }

    #[test]
    fn dispatch_on_unregistered_vector_is_a_no_op() {
        let ctx = Context::zeroed();
        // vector 201 is never registered; this must not panic.
        dispatch(201, &ctx);
        let _ = noop_handler;
    }

    #[test]
    fn current_context_round_trips_the_pointer() {
        let ctx = Context::zeroed();
        set_current_context(&ctx as *const Context);
        assert_eq!(current_context(), &ctx as *const Context);
        set_current_context(core::ptr::null());
    }
}
