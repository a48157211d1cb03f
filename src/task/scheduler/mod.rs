//! Round-robin thread scheduler.
//!
//! Per §4.4: state is an intrusive ready queue of thread links and the
//! physical address of the page directory currently loaded into CR3.
//! Round-robin discipline is carried entirely by the ready-queue invariant
//! that its *tail* is always the thread currently executing — enqueuing a
//! new thread "behind" the running one is then just inserting before the
//! tail, with no special case.

mod run_queue;

use crate::arch::x86::{primitives, tss};
use crate::interrupts;
use crate::memory::address::PhysAddr;
use crate::task::thread::Thread;
use core::mem::size_of;
use core::ptr::NonNull;
use run_queue::RunQueue;
use spin::Mutex;

static READY: Mutex<RunQueue> = Mutex::new(RunQueue::new());

/// Physical address of the page directory currently loaded into CR3.
/// Plays the role of "current process" (§4.4's `current_process`); tracked
/// as just the `PhysAddr` rather than a `Process` pointer, matching
/// `Thread::page_directory`'s same simplification (§3.1).
static CURRENT_PD: Mutex<Option<PhysAddr>> = Mutex::new(None);

/// Empty the ready queue and register [`schedule`] as the timer tick
/// handler. Call once at boot, after the timer driver is ready to start
/// calling its registered handler.
pub fn initialize() {
    *READY.lock() = RunQueue::new();
    crate::timer::register_handler(schedule);
    log::info!("scheduler: initialized, round-robin");
}

/// Timer-tick entry point: pop the head of the ready queue, append it to
/// the tail, and context-switch to it. A queue of length 0 is idle — do
/// nothing and let whatever is executing (including the boot idle path)
/// keep running.
pub fn schedule() {
    let next = {
        let mut ready = READY.lock();
        let next = ready.pop_front();
        if let Some(t) = next {
            ready.push_back(t);
        }
        next
    };
    if let Some(t) = next {
        context_switch(t);
    }
}

/// Switch the active address space if `page_directory` differs from the
/// one currently loaded, then switch to `thread`'s saved context: point the
/// interrupt-return epilogue at it and set `TSS.esp0` one word past the
/// saved frame, so the next ring-3→ring-0 transition lands the CPU exactly
/// on this thread's context frame.
pub fn context_switch(mut thread: NonNull<Thread>) {
    let t = unsafe { thread.as_mut() };
    if let Some(pd) = t.page_directory {
        switch_process(pd);
    }
    let ctx_ptr = &t.context as *const _;
    interrupts::set_current_context(ctx_ptr);
    let esp0 = ctx_ptr as u32 + size_of::<crate::task::context::Context>() as u32;
    tss::set_kernel_stack(esp0);
    log::trace!("scheduler: switched to thread at {:#010x}", thread.as_ptr() as u32);
}

/// Load `page_directory` into CR3 if it isn't already active. CR3 writes
/// flush every non-global TLB entry; the kernel's global identity-mapped
/// entries survive the flush.
pub fn switch_process(page_directory: PhysAddr) {
    let mut current = CURRENT_PD.lock();
    if *current != Some(page_directory) {
        unsafe { primitives::write_cr3(page_directory.as_u32()) };
        *current = Some(page_directory);
    }
}

/// Admit a brand-new thread: link it at the tail and switch to it
/// immediately. The previously-running thread becomes second-to-last.
pub fn new(thread: NonNull<Thread>) {
    READY.lock().push_back(thread);
    context_switch(thread);
}

/// Insert `thread` just behind the currently-running thread, preserving
/// the "tail = running" invariant. If the queue is empty there is no
/// running thread to stay behind, so `thread` is simply prepended — it
/// does not become current until a subsequent `schedule`/`new` (§9).
pub fn enqueue(thread: NonNull<Thread>) {
    let mut ready = READY.lock();
    if ready.is_empty() {
        ready.push_front(thread);
    } else {
        // "Before the tail" == pop the tail, link the new thread, then the
        // old tail back on — net effect: new thread sits directly behind
        // the running one without disturbing who is running.
        let running = ready.pop_back().expect("checked non-empty above");
        ready.push_back(thread);
        ready.push_back(running);
    }
}

/// Deschedule the currently-running thread (the queue's tail). If another
/// thread remains, it becomes the new running thread via the same
/// pop-front/push-back/switch sequence as [`schedule`]. Returns the
/// descheduled thread for the caller to destroy or park.
pub fn dequeue() -> Option<NonNull<Thread>> {
    let (popped, next) = {
        let mut ready = READY.lock();
        let popped = ready.pop_back();
        let next = if popped.is_some() {
            let head = ready.pop_front();
            if let Some(h) = head {
                ready.push_back(h);
            }
            head
        } else {
            None
        };
        (popped, next)
    };
    if let Some(t) = next {
        context_switch(t);
    }
    popped
}

/// Remove `thread` from the ready queue. If it is the currently-running
/// thread this is exactly [`dequeue`]; otherwise it is unlinked in place
/// without disturbing who is running.
pub fn remove(thread: NonNull<Thread>) -> Option<NonNull<Thread>> {
    if current() == Some(thread) {
        dequeue()
    } else {
        READY.lock().remove(thread);
        Some(thread)
    }
}

/// The currently-running thread (the ready queue's tail), if any.
pub fn current() -> Option<NonNull<Thread>> {
    READY.lock().tail()
}

/// Cooperative thread exit, invoked by the page-fault handler when a thread
/// faults against `layout::THREAD_DESTROY` (§5's "Cancellation"). Equivalent
/// to descheduling the running thread.
pub fn destroy_current() -> Option<NonNull<Thread>> {
    dequeue()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::thread::Thread;

    fn ptr(t: &mut Thread) -> NonNull<Thread> {
        NonNull::from(t)
    }

    /// Host tests share the global `READY`/`CURRENT_PD` statics, so each
    /// test resets them first rather than relying on execution order.
    fn reset() {
        *READY.lock() = RunQueue::new();
        *CURRENT_PD.lock() = None;
    }

    #[test]
    fn current_is_none_on_an_empty_queue() {
        reset();
        assert_eq!(current(), None);
    }

    #[test]
    fn schedule_on_empty_queue_is_a_no_op() {
        reset();
        schedule(); // must not panic
        assert_eq!(current(), None);
    }

    #[test]
    fn round_robin_cycles_through_three_threads() {
        reset();
        let mut a = Thread::kernel();
        let mut b = Thread::kernel();
        let mut c = Thread::kernel();
        // Admitting each as new leaves the queue in order [A, B, C] with C
        // running, matching scenario 4.
        new(ptr(&mut a));
        new(ptr(&mut b));
        new(ptr(&mut c));
        assert_eq!(current(), Some(ptr(&mut c)));

        schedule();
        assert_eq!(current(), Some(ptr(&mut a)));
        schedule();
        assert_eq!(current(), Some(ptr(&mut b)));
        schedule();
        assert_eq!(current(), Some(ptr(&mut c)));
    }

    #[test]
    fn enqueue_does_not_disturb_who_is_currently_running() {
        reset();
        let mut a = Thread::kernel();
        let mut b = Thread::kernel();
        let mut c = Thread::kernel();
        new(ptr(&mut a));
        assert_eq!(current(), Some(ptr(&mut a)));
        enqueue(ptr(&mut b));
        enqueue(ptr(&mut c));
        // A is still running; B and C are queued behind it in FIFO order.
        assert_eq!(current(), Some(ptr(&mut a)));
        schedule();
        assert_eq!(current(), Some(ptr(&mut b)));
        schedule();
        assert_eq!(current(), Some(ptr(&mut c)));
        schedule();
        assert_eq!(current(), Some(ptr(&mut a)));
    }

    #[test]
    fn enqueue_on_an_empty_queue_prepends_without_becoming_current() {
        reset();
        let mut a = Thread::kernel();
        enqueue(ptr(&mut a));
        // Per the open question in §9: an empty queue has no running
        // thread, so the newly enqueued thread is not automatically
        // current until a later schedule()/new().
        assert_eq!(current(), None);
        schedule();
        assert_eq!(current(), Some(ptr(&mut a)));
    }

    #[test]
    fn new_thread_runs_immediately_and_predecessor_is_second_to_last() {
        reset();
        let mut a = Thread::kernel();
        let mut b = Thread::kernel();
        new(ptr(&mut a));
        assert_eq!(current(), Some(ptr(&mut a)));
        new(ptr(&mut b));
        assert_eq!(current(), Some(ptr(&mut b)));
    }

    #[test]
    fn dequeue_promotes_the_next_head_to_running() {
        reset();
        let mut a = Thread::kernel();
        let mut b = Thread::kernel();
        new(ptr(&mut a));
        enqueue(ptr(&mut b));
        assert_eq!(current(), Some(ptr(&mut b)));
        let removed = dequeue();
        assert_eq!(removed, Some(ptr(&mut b)));
        assert_eq!(current(), Some(ptr(&mut a)));
    }

    #[test]
    fn dequeue_on_last_thread_leaves_queue_empty() {
        reset();
        let mut a = Thread::kernel();
        new(ptr(&mut a));
        let removed = dequeue();
        assert_eq!(removed, Some(ptr(&mut a)));
        assert_eq!(current(), None);
    }

    #[test]
    fn remove_non_running_thread_does_not_change_current() {
        reset();
        let mut a = Thread::kernel();
        let mut b = Thread::kernel();
        let mut c = Thread::kernel();
        new(ptr(&mut a));
        enqueue(ptr(&mut b));
        enqueue(ptr(&mut c));
        assert_eq!(current(), Some(ptr(&mut c)));
        remove(ptr(&mut b));
        assert_eq!(current(), Some(ptr(&mut c)));
    }

    #[test]
    fn remove_running_thread_behaves_like_dequeue() {
        reset();
        let mut a = Thread::kernel();
        let mut b = Thread::kernel();
        new(ptr(&mut a));
        enqueue(ptr(&mut b));
        assert_eq!(current(), Some(ptr(&mut b)));
        remove(ptr(&mut b));
        assert_eq!(current(), Some(ptr(&mut a)));
    }

    #[test]
    fn context_switch_points_tss_esp0_one_word_past_the_context_frame() {
        reset();
        let mut a = Thread::kernel();
        let addr = ptr(&mut a);
        context_switch(addr);
        let expected_esp0 =
            &a.context as *const _ as u32 + size_of::<crate::task::context::Context>() as u32;
        assert_eq!(tss::current_esp0(), expected_esp0);
        assert_eq!(interrupts::current_context(), &a.context as *const _);
    }

    #[test]
    fn switch_process_only_writes_cr3_when_the_target_differs() {
        reset();
        let pd = PhysAddr::new(0x0030_0000);
        switch_process(pd);
        assert_eq!(*CURRENT_PD.lock(), Some(pd));
        switch_process(pd); // idempotent: still the same address space
        assert_eq!(*CURRENT_PD.lock(), Some(pd));
    }
}
