//! Task context model and preemption.
//!
//! This module provides:
//! - Stack initialisation for tasks that have never run
//! - Critical section accounting, saved per task
//! - The voluntary yield path and the current-task handle used by the vectors
//! - The tick interrupt bridge
//! - The trap catching entry functions that return

pub mod critical;
pub mod exit;
pub mod stack;
pub mod switch;
pub mod tick;

pub use critical::{CriticalSection, enter_critical, exit_critical};
pub use exit::task_exit_trap;
pub use stack::{StackRegion, initialize_stack};
pub use switch::{TopOfStack, current_task, set_current_task, yield_now};
pub use tick::{TickKind, tick_handler};

/// Entry function of a task. The argument arrives in the first argument register.
pub type TaskFunction = extern "C" fn(usize);
