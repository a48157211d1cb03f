//! Architecture-specific code.
//!
//! This kernel core targets 32-bit protected-mode x86 only; there is no
//! cross-architecture abstraction layer to generalize over.

pub mod x86;
