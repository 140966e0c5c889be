//! Initial stack image of a new task.
//!
//! A task that has never run is given a stack that looks exactly as if it
//! had been interrupted just before the first instruction of its entry
//! function. The restore path then starts it like any other task.

use anyhow::ensure;
use memory_addr::VirtAddr;

use super::TaskFunction;
use super::exit::task_exit_trap;
use crate::PortResult;
use crate::arch;
use crate::config::kernel::{INITIAL_FPSR, MIN_STACK_WORDS, STACK_PADDING_WORDS};
use crate::hal::context::{ARG_REG, CONTEXT_WORDS, FRAME_POINTER_REG, LINK_REG, SDA_RO_REG};
use crate::hal::{SmallDataArea, StatusFlags, TaskContext};

// Padding, the context and up to one word lost to alignment.
const _: () = assert!(MIN_STACK_WORDS >= STACK_PADDING_WORDS + CONTEXT_WORDS + 1);

/// Builds the context a task starts from.
fn initial_context(
    entry: TaskFunction,
    argument: usize,
    status: StatusFlags,
    small_data: SmallDataArea,
) -> TaskContext {
    let mut ctx = TaskContext::zeroed();

    if cfg!(feature = "stack-preload") {
        // Recognisable values for the debugger. The frame pointer stays 0 to
        // terminate backtraces.
        for (i, reg) in ctx.x[..FRAME_POINTER_REG].iter_mut().enumerate() {
            *reg = i;
        }
    }

    ctx.x[ARG_REG] = argument;
    ctx.x[SDA_RO_REG] = small_data.read_only;
    // An entry function has nothing to return to.
    ctx.x[LINK_REG] = task_exit_trap as usize;
    ctx.sda_rw = small_data.read_write;
    ctx.elr = entry as usize;
    ctx.spsr = status.bits();
    ctx.fpsr = INITIAL_FPSR;
    #[cfg(feature = "fpu")]
    {
        ctx.fpcr = crate::config::kernel::INITIAL_FPCR;
    }
    ctx.nesting = 0;
    ctx
}

/// Writes the initial context of a task below `top_of_stack` and returns the
/// new top of stack.
///
/// `top_of_stack` is the highest word of the region. Three zero words go
/// there first, then the context, aligned down to 16 bytes. The returned
/// pointer is what the kernel stores in the task's [`TopOfStack`] cell.
///
/// # Safety
/// The `MIN_STACK_WORDS` words ending at `top_of_stack` must be valid for
/// writes and owned by the task.
///
/// [`TopOfStack`]: super::TopOfStack
pub unsafe fn initialize_stack(
    top_of_stack: *mut usize,
    entry: TaskFunction,
    argument: usize,
) -> *mut usize {
    for i in 0..STACK_PADDING_WORDS {
        unsafe { top_of_stack.sub(i).write(0) };
    }

    let frame_end = top_of_stack.wrapping_sub(STACK_PADDING_WORDS - 1);
    let frame_end = frame_end.wrapping_byte_sub(frame_end as usize % 16);
    let frame = frame_end.wrapping_sub(CONTEXT_WORDS);

    let status = StatusFlags::initial(arch::current_status());
    let ctx = initial_context(entry, argument, status, arch::small_data_area());
    unsafe { frame.cast::<TaskContext>().write(ctx) };

    trace!(
        "initial context for entry {:#x} at {:#x}",
        entry as usize, frame as usize
    );
    frame
}

/// Caller-owned stack memory of one task.
pub struct StackRegion<'a> {
    words: &'a mut [usize],
}

impl<'a> StackRegion<'a> {
    /// Wraps a block of machine words.
    pub fn new(words: &'a mut [usize]) -> Self {
        Self { words }
    }

    /// Size in words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if the region holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Lowest address of the region.
    pub fn bottom(&self) -> VirtAddr {
        VirtAddr::from(self.words.as_ptr() as usize)
    }

    /// One past the highest address of the region.
    pub fn end(&self) -> VirtAddr {
        VirtAddr::from(self.words.as_ptr_range().end as usize)
    }

    /// Writes the initial context of `entry(argument)` into the region and
    /// returns the new top of stack.
    pub fn initialize(&mut self, entry: TaskFunction, argument: usize) -> PortResult<*mut usize> {
        ensure!(
            self.words.len() >= MIN_STACK_WORDS,
            "stack of {} words is smaller than the minimum of {}",
            self.words.len(),
            MIN_STACK_WORDS
        );
        let top = self.words.as_mut_ptr_range().end.wrapping_sub(1);
        // SAFETY: the region is borrowed mutably and holds at least
        // MIN_STACK_WORDS words ending at `top`.
        Ok(unsafe { initialize_stack(top, entry, argument) })
    }
}
