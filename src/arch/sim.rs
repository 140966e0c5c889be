//! Simulated processor for hosted builds.
//!
//! Models what the port layer touches on real hardware: the IRQ mask, the
//! live register file, and the exception entry and return sequences. Entry
//! and return use the same context layout and restore rule as the AArch64
//! vectors, so everything above this module runs unchanged on the host.
//!
//! Control transfer is the one thing that cannot be simulated: restoring a
//! task loads its registers but does not resume its code. Only
//! [`start_first_task`] actually calls into a task, running its entry
//! function and then whatever its link register points at.

use core::sync::atomic::{AtomicUsize, Ordering};

use memory_addr::VirtAddr;
use spin::Mutex;

use crate::hal::context::{ARG_REG, CTX_SIZE, LINK_REG};
use crate::hal::{SmallDataArea, StatusFlags, TaskContext};
use crate::port::PORT;
use crate::task::TaskFunction;
use crate::task::critical::PORT_CRITICAL_NESTING;
use crate::task::switch::current_task;

/// Small-data bases stamped into task contexts on the host.
pub const SIM_SMALL_DATA: SmallDataArea = SmallDataArea {
    read_only: 0x5da2_0000,
    read_write: 0x5da0_0000,
};

/// DAIF bits of the simulated processor. Everything is masked out of reset.
static STATUS: AtomicUsize = AtomicUsize::new(StatusFlags::ALL_MASKED.bits());

struct Processor {
    /// Live registers; `elr` doubles as the program counter.
    regs: TaskContext,
    sp: usize,
}

static CPU: Mutex<Processor> = Mutex::new(Processor {
    regs: TaskContext::zeroed(),
    sp: 0,
});

/// Current processor status, as a task running in EL1t would see it.
pub fn current_status() -> StatusFlags {
    StatusFlags::from_bits_retain(STATUS.load(Ordering::Acquire)) | StatusFlags::EL1T
}

/// Returns `true` if IRQs are unmasked.
pub fn irqs_enabled() -> bool {
    !current_status().contains(StatusFlags::IRQ_MASKED)
}

/// Masks IRQs.
pub fn disable_irqs() {
    STATUS.fetch_or(StatusFlags::IRQ_MASKED.bits(), Ordering::AcqRel);
}

/// Unmasks IRQs.
pub fn enable_irqs() {
    STATUS.fetch_and(!StatusFlags::IRQ_MASKED.bits(), Ordering::AcqRel);
}

/// Small-data bases of this image.
pub fn small_data_area() -> SmallDataArea {
    SIM_SMALL_DATA
}

/// Exception entry: masks IRQs and pushes the live registers onto the
/// running task's stack, publishing the new top of stack.
///
/// Returns the status in effect when the exception was taken.
pub fn exception_entry() -> StatusFlags {
    let interrupted = StatusFlags::from_bits_retain(
        STATUS.fetch_or(StatusFlags::IRQ_MASKED.bits(), Ordering::AcqRel),
    ) | StatusFlags::EL1T;

    if let Some(top_of_stack) = current_task() {
        let mut cpu = CPU.lock();
        let mut frame = cpu.regs;
        frame.spsr = interrupted.bits();
        frame.nesting = PORT_CRITICAL_NESTING.load(Ordering::Relaxed);

        let top = (cpu.sp as *mut TaskContext).wrapping_sub(1);
        // SAFETY: `sp` was loaded from this task's own stack by the last
        // restore, and the initializer left room for a full frame below it.
        unsafe { top.write(frame) };
        cpu.sp = top as usize;
        top_of_stack.store(top.cast(), Ordering::Release);
    }
    interrupted
}

/// Exception return: pops the context of whatever task is current now.
///
/// With no task selected yet, only the interrupted status comes back.
pub fn exception_return(interrupted: StatusFlags) {
    let Some(top_of_stack) = current_task() else {
        STATUS.store(interrupted.bits(), Ordering::Release);
        return;
    };

    let top = top_of_stack.load(Ordering::Acquire);
    // SAFETY: the kernel only publishes stacks produced by the initializer
    // or by `exception_entry`.
    let frame = unsafe { TaskContext::read_from(top) };

    PORT_CRITICAL_NESTING.store(frame.nesting, Ordering::Relaxed);
    {
        let mut cpu = CPU.lock();
        cpu.regs = frame;
        cpu.sp = top as usize + CTX_SIZE;
    }
    STATUS.store(
        frame.status().on_resume(frame.nesting).bits(),
        Ordering::Release,
    );
}

/// Restores the current task and runs it.
///
/// # Safety
/// The current task must hold a context produced by the stack initializer.
pub unsafe fn start_first_task(_isr_stack_top: VirtAddr) {
    exception_return(current_status());
    run_live_task();
}

fn run_live_task() {
    let (pc, arg, link) = {
        let cpu = CPU.lock();
        (cpu.regs.elr, cpu.regs.x[ARG_REG], cpu.regs.x[LINK_REG])
    };
    // SAFETY: `elr` of a task that has never run holds its entry function.
    let entry = unsafe { core::mem::transmute::<usize, TaskFunction>(pc) };
    entry(arg);

    // Returning from the entry function lands on the link register.
    // SAFETY: the initializer loads x30 with the task-return trap.
    let trap = unsafe { core::mem::transmute::<usize, extern "C" fn()>(link) };
    trap();
}

/// Voluntary switch, as taken through `svc` on hardware.
pub fn yield_trap() {
    let interrupted = exception_entry();
    PORT.switch_context();
    exception_return(interrupted);
}

/// Delivers one IRQ through the port, as the IRQ vector does.
///
/// Returns `false`, delivering nothing, while IRQs are masked.
pub fn raise_irq() -> bool {
    if !irqs_enabled() {
        return false;
    }
    let interrupted = exception_entry();
    PORT.handle_interrupt(crate::drivers::irq::dispatch);
    exception_return(interrupted);
    true
}

/// Nothing to wait for on the host.
pub fn park() {}

/// Live registers and stack pointer.
pub fn live_registers() -> (TaskContext, usize) {
    let cpu = CPU.lock();
    (cpu.regs, cpu.sp)
}

/// Loads the live registers, as if code had just branched somewhere with
/// the given status.
pub fn load_registers(regs: TaskContext, sp: usize, status: StatusFlags) {
    {
        let mut cpu = CPU.lock();
        cpu.regs = regs;
        cpu.sp = sp;
    }
    STATUS.store(status.bits(), Ordering::Release);
}

/// Back to the reset state.
#[cfg(test)]
pub(crate) fn reset() {
    load_registers(TaskContext::zeroed(), 0, StatusFlags::ALL_MASKED);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_reset_masks_everything() {
        let _guard = test_support::serial();
        reset();
        assert!(!irqs_enabled());
        assert!(current_status().contains(StatusFlags::ALL_MASKED));
        enable_irqs();
        assert!(irqs_enabled());
        disable_irqs();
        assert!(!irqs_enabled());
    }

    #[test]
    fn test_exception_without_task_restores_status() {
        let _guard = test_support::serial();
        test_support::reset();
        enable_irqs();

        let interrupted = exception_entry();
        assert!(!irqs_enabled());
        assert!(!interrupted.contains(StatusFlags::IRQ_MASKED));
        exception_return(interrupted);
        assert!(irqs_enabled());
    }

    #[test]
    fn test_raise_irq_respects_mask() {
        let _guard = test_support::serial();
        test_support::reset();
        assert!(!raise_irq());
        enable_irqs();
        assert!(raise_irq());
        assert!(irqs_enabled());
    }
}
