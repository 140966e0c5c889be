//! HAL (Hardware Abstraction Layer) module.
//!
//! Architecture-neutral pieces shared by the assembly and the portable
//! scheduling core: the saved context layout, the interrupt stack, and the
//! IRQ-masking spin lock.

pub mod context;
pub mod isr_stack;
pub mod spin;

pub use context::{SmallDataArea, StatusFlags, TaskContext};
pub use spin::{Mutex, SpinNoIrq};
