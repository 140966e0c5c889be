//! Dedicated interrupt-service stack.
//!
//! Exceptions are taken on SP_EL1, which points into this region once the
//! scheduler has started. No task stack ever has to be large enough to hold
//! an interrupt frame on top of its own usage.

use memory_addr::{MemoryAddr, VirtAddr};

use crate::config::kernel::{ISR_STACK_SIZE, ISR_STACK_SPILL_WORDS};
use crate::hal::context::WORD;

#[repr(C, align(16))]
struct IsrStack([u8; ISR_STACK_SIZE]);

static mut ISR_STACK: IsrStack = IsrStack([0; ISR_STACK_SIZE]);

/// Lowest address of the interrupt stack.
pub fn base() -> VirtAddr {
    VirtAddr::from((&raw const ISR_STACK) as usize)
}

/// Initial stack pointer for interrupt context.
///
/// Leaves room for the callee to write back into the caller's frame.
pub fn top() -> VirtAddr {
    (base() + ISR_STACK_SIZE - ISR_STACK_SPILL_WORDS * WORD).align_down(16usize)
}
