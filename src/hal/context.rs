//! Saved task context.
//!
//! A suspended task is a [`TaskContext`] sitting at the top of its own stack.
//! The exception vectors in `arch` save and restore it with the byte offsets
//! derived from this definition, and the stack initializer synthesizes the
//! same shape for tasks that have never run, so the restore path never needs
//! to know which of the two it is looking at.
//!
//! The register order follows the AArch64 procedure call standard: x0 carries
//! the first argument, x18 is the platform register, x29 is the frame pointer
//! and x30 the link register.
//!
//! With the `fpu` feature the context also carries FPCR and the 32 SIMD&FP
//! registers after the integer part. Without it the image must not contain
//! any FP/SIMD code at all (build for `aarch64-unknown-none-softfloat`).

use core::fmt;
use core::mem::{offset_of, size_of};

/// Size of one stack slot.
pub const WORD: usize = size_of::<usize>();

/// Number of general-purpose registers saved (x0..x30).
pub const GPR_COUNT: usize = 31;

/// Register carrying the entry function's argument.
pub const ARG_REG: usize = 0;

/// Register carrying the read-only small-data base.
pub const SDA_RO_REG: usize = 18;

/// Frame pointer.
pub const FRAME_POINTER_REG: usize = 29;

/// Subroutine return address.
pub const LINK_REG: usize = 30;

bitflags::bitflags! {
    /// Processor status bits kept in a saved context (SPSR_EL1 layout).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: usize {
        /// EL1 running on SP_EL0 (M[3:0] = 0b0100).
        const EL1T          = 0b0100;
        /// FIQs masked.
        const FIQ_MASKED    = 1 << 6;
        /// IRQs masked.
        const IRQ_MASKED    = 1 << 7;
        /// SError exceptions masked.
        const SERROR_MASKED = 1 << 8;
        /// Debug exceptions masked.
        const DEBUG_MASKED  = 1 << 9;
    }
}

impl StatusFlags {
    /// Every DAIF bit set, as after reset.
    pub const ALL_MASKED: Self = Self::FIQ_MASKED
        .union(Self::IRQ_MASKED)
        .union(Self::SERROR_MASKED)
        .union(Self::DEBUG_MASKED);

    /// Status given to a task that has never run.
    ///
    /// IRQs are masked: the task gets them unmasked when it is dispatched for
    /// the first time. With the `exceptions` feature, SError and debug
    /// exceptions are unmasked.
    pub fn initial(current: StatusFlags) -> Self {
        let mut status = current | Self::EL1T | Self::IRQ_MASKED;
        if cfg!(feature = "exceptions") {
            status.remove(Self::SERROR_MASKED | Self::DEBUG_MASKED);
        }
        status
    }

    /// Status a task resumes with after its context is restored.
    ///
    /// Verbatim, except that a task outside any critical section always runs
    /// with IRQs unmasked.
    pub fn on_resume(self, nesting: usize) -> Self {
        if nesting == 0 {
            self - Self::IRQ_MASKED
        } else {
            self
        }
    }
}

/// Base addresses of the small-data areas, constant for the whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmallDataArea {
    /// Read-only small data, carried in x18.
    pub read_only: usize,
    /// Read/write small data, carried in TPIDR_EL0.
    pub read_write: usize,
}

/// Number of SIMD&FP registers saved with the `fpu` feature (q0..q31).
pub const FP_REG_COUNT: usize = 32;

/// Saved registers of a suspended task.
#[repr(C)]
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    /// General-purpose registers (x0..x30).
    pub x: [usize; GPR_COUNT],
    /// Read/write small-data base (TPIDR_EL0).
    pub sda_rw: usize,
    /// Interrupt return address (ELR_EL1).
    pub elr: usize,
    /// Processor status (SPSR_EL1).
    pub spsr: usize,
    /// Floating-point status. Reserved when built without `fpu`.
    pub fpsr: usize,
    /// Critical section nesting depth.
    pub nesting: usize,
    /// Floating-point control (FPCR).
    #[cfg(feature = "fpu")]
    pub fpcr: usize,
    #[cfg(feature = "fpu")]
    _reserved: usize,
    /// SIMD&FP registers (q0..q31).
    #[cfg(feature = "fpu")]
    pub v: [u128; FP_REG_COUNT],
}

/// Size of a saved context in words.
pub const CONTEXT_WORDS: usize = size_of::<TaskContext>() / WORD;

/// Byte offsets used by the assembly save/restore sequences.
pub const CTX_SIZE: usize = size_of::<TaskContext>();
pub const CTX_SDA_RW: usize = offset_of!(TaskContext, sda_rw);
pub const CTX_ELR: usize = offset_of!(TaskContext, elr);
pub const CTX_SPSR: usize = offset_of!(TaskContext, spsr);
pub const CTX_FPSR: usize = offset_of!(TaskContext, fpsr);
pub const CTX_NESTING: usize = offset_of!(TaskContext, nesting);
#[cfg(feature = "fpu")]
pub const CTX_FPCR: usize = offset_of!(TaskContext, fpcr);
#[cfg(feature = "fpu")]
pub const CTX_V: usize = offset_of!(TaskContext, v);

// The vectors move ELR/SPSR and FPSR/nesting with paired loads and stores,
// and the context must keep the stack 16-byte aligned.
const _: () = assert!(CTX_SPSR == CTX_ELR + WORD);
const _: () = assert!(CTX_NESTING == CTX_FPSR + WORD);
const _: () = assert!(CTX_SIZE % 16 == 0);
#[cfg(not(feature = "fpu"))]
const _: () = assert!(CONTEXT_WORDS == 36);
#[cfg(feature = "fpu")]
const _: () = assert!(CTX_V % 16 == 0 && CTX_V == CTX_FPCR + 2 * WORD);
#[cfg(feature = "fpu")]
const _: () = assert!(CONTEXT_WORDS == 38 + FP_REG_COUNT * 2);

impl TaskContext {
    /// All-zero context.
    pub const fn zeroed() -> Self {
        Self {
            x: [0; GPR_COUNT],
            sda_rw: 0,
            elr: 0,
            spsr: 0,
            fpsr: 0,
            nesting: 0,
            #[cfg(feature = "fpu")]
            fpcr: 0,
            #[cfg(feature = "fpu")]
            _reserved: 0,
            #[cfg(feature = "fpu")]
            v: [0; FP_REG_COUNT],
        }
    }

    /// Saved processor status.
    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.spsr)
    }

    /// Reads the context saved at `top_of_stack`.
    ///
    /// # Safety
    /// `top_of_stack` must point at a context written by a save sequence or
    /// by the stack initializer.
    pub unsafe fn read_from(top_of_stack: *const usize) -> Self {
        unsafe { top_of_stack.cast::<TaskContext>().read() }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TaskContext: {{")?;
        for (i, &reg) in self.x.iter().enumerate() {
            writeln!(f, "    x{i}: {reg:#x},")?;
        }
        writeln!(f, "    sda_rw: {:#x},", self.sda_rw)?;
        writeln!(f, "    elr: {:#x},", self.elr)?;
        writeln!(f, "    spsr: {:#x},", self.spsr)?;
        writeln!(f, "    fpsr: {:#x},", self.fpsr)?;
        writeln!(f, "    nesting: {},", self.nesting)?;
        #[cfg(feature = "fpu")]
        {
            writeln!(f, "    fpcr: {:#x},", self.fpcr)?;
            for (i, &reg) in self.v.iter().enumerate() {
                writeln!(f, "    q{i}: {reg:#x},")?;
            }
        }
        write!(f, "}}")?;
        Ok(())
    }
}
