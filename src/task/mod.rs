//! Thread/process data types and the round-robin scheduler.
//!
//! Everything above this layer — thread identity, priorities, process
//! bookkeeping (PID, parent/child, exit codes), ELF/program loading, and the
//! syscall surface — is the external higher-level constructor layer §1
//! places out of scope. This module only fixes the concrete `Context`,
//! `Thread`, and `Process` types the scheduler and VMM share, and the
//! scheduler itself.

pub mod context;
pub mod process;
pub mod scheduler;
pub mod thread;
