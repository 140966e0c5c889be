//! Critical section accounting.
//!
//! Each task keeps its own nesting depth: the live value below is saved and
//! restored as part of the task context, so masking IRQs in one task never
//! leaks into another.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arch;
use crate::config::kernel::INITIAL_NESTING_VALUE;

/// Nesting depth of the running task.
///
/// Holds [`INITIAL_NESTING_VALUE`] until the first task is dispatched, which
/// keeps IRQs masked through any enter/exit pairs done during start-up.
pub(crate) static PORT_CRITICAL_NESTING: AtomicUsize = AtomicUsize::new(INITIAL_NESTING_VALUE);

/// Masks IRQs and enters a (possibly nested) critical section.
pub fn enter_critical() {
    arch::disable_irqs();
    PORT_CRITICAL_NESTING.fetch_add(1, Ordering::Relaxed);
}

/// Leaves a critical section, unmasking IRQs when the outermost one ends.
pub fn exit_critical() {
    let depth = PORT_CRITICAL_NESTING.load(Ordering::Relaxed);
    if depth == 0 {
        error!("exit_critical() called outside of a critical section");
        return;
    }
    PORT_CRITICAL_NESTING.store(depth - 1, Ordering::Relaxed);
    if depth == 1 {
        arch::enable_irqs();
    }
}

/// Nesting depth of the running task.
pub fn nesting() -> usize {
    PORT_CRITICAL_NESTING.load(Ordering::Relaxed)
}

/// RAII guard around [`enter_critical`] / [`exit_critical`].
pub struct CriticalSection {
    _private: (),
}

impl CriticalSection {
    /// Enters a critical section until the guard is dropped.
    pub fn enter() -> Self {
        enter_critical();
        Self { _private: () }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        exit_critical();
    }
}

/// Holds one nesting level for an interrupt handler without touching the
/// IRQ mask.
///
/// The interrupted task's depth is already saved with its context, and the
/// restore reloads whatever task runs next, so the live counter only has to
/// stay above 0 while handlers run.
pub(crate) struct IsrNesting {
    _private: (),
}

impl IsrNesting {
    pub(crate) fn enter() -> Self {
        PORT_CRITICAL_NESTING.fetch_add(1, Ordering::Relaxed);
        Self { _private: () }
    }
}

impl Drop for IsrNesting {
    fn drop(&mut self) {
        PORT_CRITICAL_NESTING.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) fn set_nesting(depth: usize) {
    PORT_CRITICAL_NESTING.store(depth, Ordering::Relaxed);
}
