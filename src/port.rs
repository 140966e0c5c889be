//! The port: glue between the kernel core and the processor.
//!
//! The kernel plugs in through [`Kernel`], the board's tick source through
//! [`TickTimer`]. Everything the exception vectors and interrupt handlers
//! need to coordinate a context switch lives in the global [`PORT`].

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Context, bail};
use lazyinit::LazyInit;

use crate::PortResult;
use crate::arch;
use crate::config::kernel::{INITIAL_NESTING_VALUE, RUN_TIME_STATS};
use crate::hal::isr_stack;
use crate::task::TickKind;
use crate::task::critical::{IsrNesting, nesting};
use crate::task::switch::current_task;
use crate::task::tick::TickBridge;

/// Services the port needs from the kernel core.
pub trait Kernel: Sync {
    /// Advances the logical clock by one tick. Returns `true` if a task of
    /// higher priority than the running one became ready.
    fn increment_tick(&self) -> bool;

    /// Picks the next task to run and publishes it with
    /// [`set_current_task`](crate::task::set_current_task).
    fn switch_context(&self);

    /// Deletes the running task.
    fn delete_current_task(&self);

    /// Name of the running task.
    fn current_task_name(&self) -> &str;

    /// Number of tasks the kernel manages, idle included.
    fn task_count(&self) -> usize;
}

/// The periodic interrupt source driving the kernel tick.
pub trait TickTimer: Sync {
    /// Programs the timer and enables its interrupt.
    fn setup(&self) -> PortResult<()>;

    /// Acknowledges the pending timer interrupt.
    fn clear_interrupt(&self);
}

pub struct Port {
    kernel: LazyInit<&'static dyn Kernel>,
    timer: LazyInit<&'static dyn TickTimer>,
    /// A context switch is wanted at the end of the outermost interrupt.
    switch_requested: AtomicBool,
    /// Interrupt handlers currently running.
    isr_depth: AtomicUsize,
    context_switches: AtomicUsize,
    tick: TickBridge,
}

impl Port {
    pub const fn new(run_time_stats: bool) -> Self {
        Self {
            kernel: LazyInit::new(),
            timer: LazyInit::new(),
            switch_requested: AtomicBool::new(false),
            isr_depth: AtomicUsize::new(0),
            context_switches: AtomicUsize::new(0),
            tick: TickBridge::new(run_time_stats),
        }
    }

    /// Plugs in the kernel core and the tick source.
    ///
    /// # Panics
    /// If called more than once.
    pub fn install(&self, kernel: &'static dyn Kernel, timer: &'static dyn TickTimer) {
        self.kernel.init_once(kernel);
        self.timer.init_once(timer);
        debug!(
            "port installed (run-time stats {})",
            if self.tick.run_time_stats() { "on" } else { "off" }
        );
    }

    pub fn is_installed(&self) -> bool {
        self.kernel.is_inited()
    }

    fn kernel(&self) -> &'static dyn Kernel {
        *self
            .kernel
            .get()
            .unwrap_or_else(|| panic!("port used before a kernel was installed"))
    }

    fn timer(&self) -> &'static dyn TickTimer {
        *self
            .timer
            .get()
            .unwrap_or_else(|| panic!("port used before a tick timer was installed"))
    }

    /// Asks for a context switch on the way out of the current interrupt.
    pub fn request_switch(&self) {
        self.switch_requested.store(true, Ordering::Release);
    }

    pub fn switch_pending(&self) -> bool {
        self.switch_requested.load(Ordering::Acquire)
    }

    /// Interrupt handlers currently running.
    pub fn interrupt_depth(&self) -> usize {
        self.isr_depth.load(Ordering::Acquire)
    }

    /// Runs `service` as an interrupt handler.
    ///
    /// A switch requested by any handler is carried out once, when the
    /// outermost handler finishes. Returns whether it happened.
    pub fn handle_interrupt<F: FnOnce()>(&self, service: F) -> bool {
        // Locks taken by handlers or by the kernel's switch must not unmask.
        let _nesting = IsrNesting::enter();
        self.isr_depth.fetch_add(1, Ordering::AcqRel);
        service();
        if self.isr_depth.fetch_sub(1, Ordering::AcqRel) != 1 {
            return false;
        }

        if self.switch_requested.swap(false, Ordering::AcqRel) {
            self.switch_context();
            true
        } else {
            false
        }
    }

    /// Lets the kernel select the next task. The caller has saved the
    /// running task's context and restores whichever task is current after.
    pub fn switch_context(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
        self.kernel().switch_context();
    }

    /// Switches performed so far.
    pub fn context_switches(&self) -> usize {
        self.context_switches.load(Ordering::Relaxed)
    }

    /// Timer interrupt body.
    pub fn on_tick_interrupt(&self) -> TickKind {
        let kind = self.tick.classify();
        self.timer().clear_interrupt();

        if kind == TickKind::Engine && self.kernel().increment_tick() {
            self.request_switch();
        }
        kind
    }

    /// Statistics time base.
    pub fn run_time_counter(&self) -> u32 {
        self.tick.run_time_counter()
    }

    /// Restarts the statistics time base.
    pub fn configure_run_time_counter(&self) {
        self.tick.reset();
    }

    /// Starts the tick and runs the current task.
    ///
    /// Only comes back if the processor returned to the caller, which is
    /// always an error.
    pub fn start_scheduler(&self) -> PortResult<()> {
        if current_task().is_none() {
            bail!("no task selected before starting the scheduler");
        }

        self.timer()
            .setup()
            .context("failed to set up the tick timer")?;
        if self.tick.run_time_stats() {
            self.configure_run_time_counter();
        }

        let isr_stack_top = isr_stack::top();
        info!(
            "starting scheduler, ISR stack top {:#x}",
            isr_stack_top.as_usize()
        );
        // SAFETY: the kernel selected a task whose context came from the
        // stack initializer.
        unsafe { arch::start_first_task(isr_stack_top) };

        bail!("scheduler returned to its caller")
    }

    /// There is nothing to tear down; only checks that no task ever ran
    /// in the current context.
    pub fn end_scheduler(&self) {
        let depth = nesting();
        assert_eq!(
            depth, INITIAL_NESTING_VALUE,
            "end_scheduler: critical nesting is {depth}, expected {INITIAL_NESTING_VALUE}"
        );
    }

    /// A task entry function returned: report it and delete the task.
    pub fn task_returned(&self) {
        let kernel = self.kernel();
        kprintln!(
            "Warning: return statement has been called from task {}, deleting it",
            kernel.current_task_name()
        );
        if kernel.task_count() == 2 {
            kprintln!("Warning: Kernel does not have any task to manage other than idle task");
        }
        kernel.delete_current_task();
    }

    #[cfg(test)]
    pub(crate) fn reset_for_test(&self) {
        self.switch_requested.store(false, Ordering::Relaxed);
        self.isr_depth.store(0, Ordering::Relaxed);
        self.context_switches.store(0, Ordering::Relaxed);
        self.tick.reset();
    }
}

/// The port of this image.
pub static PORT: Port = Port::new(RUN_TIME_STATS);
