//! AArch64 exception vectors and context switch.
//!
//! Tasks run in EL1t on SP_EL0. Exceptions are taken in EL1h on SP_EL1,
//! which the scheduler start points at the dedicated interrupt stack, so a
//! task stack only ever holds that task's own frames plus one saved context.
//!
//! The SIMD&FP registers are only part of a task context with the `fpu`
//! feature. Without it, nothing may touch them, which is what the
//! `aarch64-unknown-none-softfloat` target guarantees.

use core::arch::{asm, global_asm};

use aarch64_cpu::registers::{DAIF, ELR_EL1, ESR_EL1, Readable, VBAR_EL1, Writeable};
use memory_addr::VirtAddr;

#[cfg(all(target_feature = "neon", not(feature = "fpu")))]
compile_error!(
    "SIMD&FP registers are not saved without the `fpu` feature; \
     build for aarch64-unknown-none-softfloat or enable `fpu`"
);

#[cfg(feature = "fpu")]
use crate::hal::context::{CTX_FPCR, CTX_V};
use crate::hal::context::{CTX_ELR, CTX_FPSR, CTX_SDA_RW, CTX_SIZE};
use crate::hal::{SmallDataArea, StatusFlags};
use crate::port::PORT;

// The FP/SIMD blocks of trap.S are assembled out without `fpu`.
#[cfg(not(feature = "fpu"))]
const CTX_FPCR: usize = 0;
#[cfg(not(feature = "fpu"))]
const CTX_V: usize = 0;

global_asm!(
    include_str!("trap.S"),
    CTX_SIZE = const CTX_SIZE,
    CTX_SDA_RW = const CTX_SDA_RW,
    CTX_ELR = const CTX_ELR,
    CTX_FPSR = const CTX_FPSR,
    CTX_FPCR = const CTX_FPCR,
    CTX_V = const CTX_V,
    IRQ_MASKED = const StatusFlags::IRQ_MASKED.bits(),
    FPU = const cfg!(feature = "fpu") as usize,
    NESTING = sym crate::task::critical::PORT_CRITICAL_NESTING,
    CURRENT = sym crate::task::switch::PORT_CURRENT_TASK,
    IRQ_HANDLER = sym port_irq_handler,
    SYNC_HANDLER = sym port_sync_handler,
    INVALID_HANDLER = sym port_invalid_exception,
);

unsafe extern "C" {
    fn port_vector_table();
    fn port_start_first_task(isr_stack_top: usize) -> !;
}

/// Current processor status, as a task running in EL1t would see it.
pub fn current_status() -> StatusFlags {
    StatusFlags::from_bits_truncate(DAIF.get() as usize) | StatusFlags::EL1T
}

/// Returns `true` if IRQs are unmasked.
#[inline]
pub fn irqs_enabled() -> bool {
    !DAIF.matches_all(DAIF::I::Masked)
}

/// Masks IRQs.
#[inline]
pub fn disable_irqs() {
    unsafe { asm!("msr daifset, #2") }
}

/// Unmasks IRQs.
#[inline]
pub fn enable_irqs() {
    unsafe { asm!("msr daifclr, #2") }
}

/// Small-data bases of this image.
///
/// They are constant for the whole image, so whatever the boot code left in
/// x18 and TPIDR_EL0 is what every task gets.
pub fn small_data_area() -> SmallDataArea {
    let read_only: usize;
    let read_write: usize;
    unsafe {
        asm!("mov {}, x18", out(reg) read_only);
        asm!("mrs {}, tpidr_el0", out(reg) read_write);
    }
    SmallDataArea {
        read_only,
        read_write,
    }
}

/// Installs the vectors, moves exception handling onto the interrupt stack
/// and restores the current task.
///
/// # Safety
/// The current task must hold a valid saved context, and nothing may rely on
/// the boot stack afterwards.
pub unsafe fn start_first_task(isr_stack_top: VirtAddr) {
    #[cfg(feature = "fpu")]
    {
        use aarch64_cpu::registers::CPACR_EL1;
        CPACR_EL1.write(CPACR_EL1::FPEN::TrapNothing);
        aarch64_cpu::asm::barrier::isb(aarch64_cpu::asm::barrier::SY);
    }
    VBAR_EL1.set(port_vector_table as usize as u64);
    unsafe { port_start_first_task(isr_stack_top.as_usize()) }
}

/// Enters the switch sequence without a call frame in between.
///
/// The `svc` vector saves every register, so nothing is clobbered.
#[inline(always)]
pub fn yield_trap() {
    unsafe { asm!("svc #0") }
}

/// Waits forever.
pub fn park() -> ! {
    loop {
        aarch64_cpu::asm::wfi();
    }
}

/// Called from the IRQ vectors once the interrupted context is saved.
extern "C" fn port_irq_handler() {
    PORT.handle_interrupt(crate::drivers::irq::dispatch);
}

/// Called from the synchronous vector once the task context is saved.
extern "C" fn port_sync_handler() {
    let esr = ESR_EL1.extract();
    match esr.read_as_enum(ESR_EL1::EC) {
        Some(ESR_EL1::EC::Value::SVC64) => PORT.switch_context(),
        _ => {
            panic!(
                "Unhandled synchronous exception @ {:#x}: ESR={:#x} (EC {:#08b}, ISS {:#x})",
                ELR_EL1.get(),
                esr.get(),
                esr.read(ESR_EL1::EC),
                esr.read(ESR_EL1::ISS),
            );
        }
    }
}

extern "C" fn port_invalid_exception(kind: usize) -> ! {
    panic!(
        "Invalid exception vector {} @ {:#x}, ESR={:#x}",
        kind,
        ELR_EL1.get(),
        ESR_EL1.get()
    );
}
