//! Minimal timer interface.
//!
//! Programming the PIT/APIC and driving the actual hardware interval is the
//! external `timer` collaborator §6 places out of scope. This module only
//! holds the registered tick callback: `register_handler(fn)` installs it,
//! and the (external) timer driver calls [`tick`] once per hardware
//! interval. The scheduler registers its own `schedule` here during
//! `scheduler::initialize`.

use spin::Mutex;

/// Callback invoked on every timer tick.
pub type TickHandler = fn();

static HANDLER: Mutex<Option<TickHandler>> = Mutex::new(None);

/// Register the function called on every timer tick, replacing any
/// previous registration.
pub fn register_handler(handler: TickHandler) {
    *HANDLER.lock() = Some(handler);
}

/// Called by the (external) timer driver on each hardware tick.
pub fn tick() {
    if let Some(handler) = *HANDLER.lock() {
        handler();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static COUNT: AtomicU32 = AtomicU32::new(0);

    fn bump() {
        COUNT.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn tick_invokes_the_registered_handler_every_call() {
        COUNT.store(0, Ordering::SeqCst);
        register_handler(bump);
        tick();
        tick();
        tick();
        assert_eq!(COUNT.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn tick_with_no_handler_registered_is_a_no_op() {
        *HANDLER.lock() = None;
        tick(); // must not panic
    }
}
