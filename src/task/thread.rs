//! Thread data type and its intrusive ready-queue link.
//!
//! Per §3.1, a `Thread` here carries exactly what the scheduler and VMM
//! need: an intrusive doubly-linked [`QueueLink`], a saved [`Context`], and
//! an `Option<PhysAddr>` back-reference to its owning process's page
//! directory — enough for the scheduler to know whether a context switch
//! also needs an address-space switch, without a separate process pointer
//! on every thread. Thread identity, priority, exit codes, kernel-stack
//! allocation, and every other higher-level concern belong to the external
//! thread-constructor layer this crate does not implement.

use crate::memory::address::PhysAddr;
use crate::task::context::Context;
use core::ptr::NonNull;

/// The embedded node of the scheduler's intrusive ready-queue.
///
/// Design note (§9): rather than a separate node type recovered via a
/// pointer-offset ("container_of") helper, the queue's links point directly
/// at `Thread` objects — the ready queue's only ever element type — so
/// `prev`/`next` are plain `Thread` pointers with no offset arithmetic
/// needed to get back to the owning thread.
#[derive(Debug)]
pub struct QueueLink {
    pub(crate) prev: Option<NonNull<Thread>>,
    pub(crate) next: Option<NonNull<Thread>>,
}

impl QueueLink {
    pub const fn new() -> Self {
        QueueLink { prev: None, next: None }
    }

    /// True while this thread is linked into some queue.
    pub fn is_linked(&self) -> bool {
        self.prev.is_some() || self.next.is_some()
    }
}

impl Default for QueueLink {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread: a saved context, a ready-queue link, and the physical address
/// of the page directory it should run under (`None` for kernel threads
/// that always run under whatever address space is currently active).
#[derive(Debug)]
pub struct Thread {
    pub link: QueueLink,
    pub context: Context,
    pub page_directory: Option<PhysAddr>,
}

impl Thread {
    /// Construct a detached thread (not yet on any queue) that will resume
    /// execution from `context` under `page_directory`.
    pub const fn new(context: Context, page_directory: Option<PhysAddr>) -> Self {
        Thread {
            link: QueueLink::new(),
            context,
            page_directory,
        }
    }

    /// A detached kernel thread with a zeroed context, sharing whatever
    /// address space happens to be active.
    pub const fn kernel() -> Self {
        Self::new(Context::zeroed(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_thread_is_not_linked() {
        let t = Thread::kernel();
        assert!(!t.link.is_linked());
    }

    #[test]
    fn kernel_thread_has_no_address_space() {
        let t = Thread::kernel();
        assert_eq!(t.page_directory, None);
    }
}
