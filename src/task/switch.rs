//! Voluntary preemption and the running-task handle.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use super::critical::{enter_critical, exit_critical};
use crate::arch;

/// Kernel-owned cell holding a task's saved stack pointer.
///
/// The exception vectors store the new top of stack here on every save and
/// load it back on restore.
pub type TopOfStack = AtomicPtr<usize>;

/// Top-of-stack cell of the running task, read by the exception vectors.
pub(crate) static PORT_CURRENT_TASK: AtomicPtr<TopOfStack> = AtomicPtr::new(ptr::null_mut());

/// Makes `task` the one the next restore resumes.
///
/// Called by the kernel when it selects a task, both before the scheduler
/// starts and from `Kernel::switch_context`.
pub fn set_current_task(task: &'static TopOfStack) {
    PORT_CURRENT_TASK.store(ptr::from_ref(task).cast_mut(), Ordering::Release);
}

/// Top-of-stack cell of the running task, if one has been selected.
pub fn current_task() -> Option<&'static TopOfStack> {
    let task = PORT_CURRENT_TASK.load(Ordering::Acquire);
    // SAFETY: only `set_current_task` stores here, always from a `'static` reference.
    unsafe { task.as_ref() }
}

/// Gives up the processor.
///
/// The switch request itself runs in a critical section so the tick cannot
/// preempt it halfway; each task keeps its own nesting depth, so the masking
/// does not follow the incoming task.
pub fn yield_now() {
    enter_critical();
    arch::yield_trap();
    exit_critical();
}

#[cfg(test)]
pub(crate) fn clear_current_task() {
    PORT_CURRENT_TASK.store(ptr::null_mut(), Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim;
    use crate::hal::{StatusFlags, TaskContext};
    use crate::port::PORT;
    use crate::task::critical::nesting;
    use crate::test_support::{self, KERNEL};

    extern "C" fn idle(_: usize) {}

    #[test]
    fn test_current_task_roundtrip() {
        let _guard = test_support::serial();
        test_support::reset();
        assert!(current_task().is_none());
        let cell = test_support::new_task(idle, 0);
        set_current_task(cell);
        assert!(ptr::eq(current_task().unwrap(), cell));
    }

    #[test]
    fn test_yield_switches_and_keeps_per_task_nesting() {
        let _guard = test_support::serial();
        test_support::install();
        test_support::reset();

        let a = test_support::new_task(idle, 1);
        let b = test_support::new_task(idle, 2);
        set_current_task(a);
        KERNEL.make_ready(b);

        // Dispatch A: fresh context, so it runs outside any critical section.
        sim::exception_return(StatusFlags::ALL_MASKED);
        assert_eq!(nesting(), 0);
        assert!(sim::irqs_enabled());

        // A asks for a switch from inside its yield critical section.
        enter_critical();
        sim::yield_trap();
        assert!(ptr::eq(current_task().unwrap(), b));
        assert_eq!(PORT.context_switches(), 1);

        let saved_a = unsafe { TaskContext::read_from(a.load(Ordering::Acquire)) };
        assert_eq!(saved_a.nesting, 1);
        assert!(saved_a.status().contains(StatusFlags::IRQ_MASKED));

        // B was never run: it comes up with nesting 0 and IRQs unmasked.
        assert_eq!(nesting(), 0);
        assert!(sim::irqs_enabled());
        let (live, _) = sim::live_registers();
        assert_eq!(live.x[0], 2);

        // B yields back; A resumes inside its critical section and leaves it.
        yield_now();
        assert!(ptr::eq(current_task().unwrap(), a));
        assert_eq!(PORT.context_switches(), 2);
        assert_eq!(nesting(), 0);
        assert!(sim::irqs_enabled());
        let (live, _) = sim::live_registers();
        assert_eq!(live.x[0], 1);

        let saved_b = unsafe { TaskContext::read_from(b.load(Ordering::Acquire)) };
        assert_eq!(saved_b.nesting, 1);
    }
}
