//! rstiny_port - AArch64 port layer of a preemptive real-time kernel.
//!
//! The kernel core owns tasks and scheduling policy; this crate owns
//! everything between it and the processor:
//! - the saved task context and the initial stack image of a new task
//! - the exception vectors that save, switch and restore contexts
//! - the tick interrupt, with optional run-time statistics multiplexing
//! - per-task critical section nesting
//! - the interrupt controller registration surface and the console
//!
//! A kernel implements [`Kernel`], a board provides a [`TickTimer`] and an
//! [`InterruptController`](drivers::irq::InterruptController), and both are
//! plugged into the global [`PORT`] before [`Port::start_scheduler`] runs.
//!
//! Hosted builds (everything but bare-metal AArch64) run on a simulated
//! processor, which is what the test suite exercises.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

#[macro_use]
pub mod console;

pub mod arch;
pub mod config;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod platform;
pub mod port;
pub mod task;

#[cfg(test)]
mod test_support;

pub use error::PortResult;
pub use port::{Kernel, PORT, Port, TickTimer};
pub use task::{
    CriticalSection, StackRegion, TaskFunction, TopOfStack, enter_critical, exit_critical,
    initialize_stack, set_current_task, task_exit_trap, yield_now,
};
