//! Kernel port configuration constants.

/// Critical nesting depth in effect before the first task is dispatched.
///
/// Tasks start with a depth of 0, so no enter/exit pairing performed before
/// the scheduler starts can bring the counter back to 0 and unmask IRQs.
pub const INITIAL_NESTING_VALUE: usize = 0xff;

/// Timer interrupts per logical tick when run-time statistics share the tick timer.
pub const RUN_TIME_STATS_MULTIPLIER: u32 = 10;

/// Whether the global port multiplexes run-time statistics on the tick timer.
pub const RUN_TIME_STATS: bool = cfg!(feature = "run-time-stats");

/// Logical ticks per second.
pub const TICKS_PER_SEC: usize = 100;

/// Size of the dedicated interrupt-service stack.
pub const ISR_STACK_SIZE: usize = 0x4000; // 16K

/// Words reserved at the top of the ISR stack for the callee to spill into.
pub const ISR_STACK_SPILL_WORDS: usize = 2;

/// Value of FPSR in the context of a newly created task.
pub const INITIAL_FPSR: usize = 0;

/// Zero words written above the first context of a new task.
pub const STACK_PADDING_WORDS: usize = 3;

/// Smallest stack that can hold the initial context of a task.
pub const MIN_STACK_WORDS: usize = if cfg!(feature = "fpu") { 160 } else { 64 };

/// Value of FPCR in the context of a newly created task.
pub const INITIAL_FPCR: usize = 0;

/// Maximum number of interrupts supported (SGIs + PPIs + SPIs).
pub const MAX_IRQ_COUNT: usize = 1024;
