//! Catches task entry functions that return.

use crate::arch;
use crate::port::PORT;

/// Loaded into the link register of every new task.
///
/// A task entry function must never return. If one does, it lands here:
/// the task is reported and deleted, and the processor waits for the next
/// interrupt to switch it away.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub extern "C" fn task_exit_trap() -> ! {
    PORT.task_returned();
    arch::park()
}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
const _: extern "C" fn() -> ! = task_exit_trap;

/// Hosted variant: the simulated processor has nothing to park on, so the
/// trap returns to whoever dispatched the task.
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub extern "C" fn task_exit_trap() {
    PORT.task_returned();
    arch::park();
}
