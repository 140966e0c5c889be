//! Shared fixtures for the host test suite.
//!
//! The simulated processor, the global port and the critical nesting
//! counter are process-wide, so every test touching them holds
//! [`serial`] and starts from [`reset`].

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, Once};

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::PortResult;
use crate::arch::sim;
use crate::config::kernel::INITIAL_NESTING_VALUE;
use crate::drivers::irq::{self, InterruptController, IrqId};
use crate::port::{Kernel, PORT, TickTimer};
use crate::task::critical::set_nesting;
use crate::task::switch::{clear_current_task, current_task, set_current_task};
use crate::task::{StackRegion, TaskFunction, TopOfStack};

static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that share global state. A test that panicked while
/// holding the lock does not poison the rest.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Kernel core stand-in: round-robin over a ready queue.
pub struct MockKernel {
    ticks: AtomicUsize,
    unblock_every: AtomicUsize,
    switches: AtomicUsize,
    deleted: AtomicUsize,
    tasks: AtomicUsize,
    name: spin::Mutex<&'static str>,
    ready: spin::Mutex<VecDeque<&'static TopOfStack>>,
}

impl MockKernel {
    const fn new() -> Self {
        Self {
            ticks: AtomicUsize::new(0),
            unblock_every: AtomicUsize::new(0),
            switches: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
            tasks: AtomicUsize::new(2),
            name: spin::Mutex::new("task"),
            ready: spin::Mutex::new(VecDeque::new()),
        }
    }

    pub fn make_ready(&self, task: &'static TopOfStack) {
        self.ready.lock().push_back(task);
    }

    /// Name and task count reported for the running task.
    pub fn set_task(&self, name: &'static str, count: usize) {
        *self.name.lock() = name;
        self.tasks.store(count, Ordering::Relaxed);
    }

    /// Makes every `n`th clock advance report an unblocked task; 0 never does.
    pub fn unblock_every(&self, n: usize) {
        self.unblock_every.store(n, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn switches(&self) -> usize {
        self.switches.load(Ordering::Relaxed)
    }

    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.unblock_every.store(0, Ordering::Relaxed);
        self.switches.store(0, Ordering::Relaxed);
        self.deleted.store(0, Ordering::Relaxed);
        self.set_task("task", 2);
        self.ready.lock().clear();
    }
}

impl Kernel for MockKernel {
    fn increment_tick(&self) -> bool {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let every = self.unblock_every.load(Ordering::Relaxed);
        every != 0 && ticks % every == 0
    }

    fn switch_context(&self) {
        self.switches.fetch_add(1, Ordering::Relaxed);
        let mut ready = self.ready.lock();
        if let Some(running) = current_task() {
            ready.push_back(running);
        }
        if let Some(next) = ready.pop_front() {
            set_current_task(next);
        }
    }

    fn delete_current_task(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn current_task_name(&self) -> &str {
        *self.name.lock()
    }

    fn task_count(&self) -> usize {
        self.tasks.load(Ordering::Relaxed)
    }
}

pub struct MockTimer {
    setups: AtomicUsize,
    clears: AtomicUsize,
    fail_next: AtomicBool,
}

impl MockTimer {
    const fn new() -> Self {
        Self {
            setups: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn setups(&self) -> usize {
        self.setups.load(Ordering::Relaxed)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::Relaxed)
    }

    pub fn fail_next_setup(&self) {
        self.fail_next.store(true, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.setups.store(0, Ordering::Relaxed);
        self.clears.store(0, Ordering::Relaxed);
        self.fail_next.store(false, Ordering::Relaxed);
    }
}

impl TickTimer for MockTimer {
    fn setup(&self) -> PortResult<()> {
        if self.fail_next.swap(false, Ordering::Relaxed) {
            anyhow::bail!("timer refused to start");
        }
        self.setups.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn clear_interrupt(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }
}

/// Interrupt controller with a software pending queue.
pub struct MockController {
    inits: AtomicUsize,
    fail_next_init: AtomicBool,
    enabled: spin::Mutex<Vec<IrqId>>,
    masked_during_enable: spin::Mutex<Option<bool>>,
    pending: spin::Mutex<VecDeque<IrqId>>,
    completed: spin::Mutex<Vec<IrqId>>,
}

impl MockController {
    pub const fn new() -> Self {
        Self {
            inits: AtomicUsize::new(0),
            fail_next_init: AtomicBool::new(false),
            enabled: spin::Mutex::new(Vec::new()),
            masked_during_enable: spin::Mutex::new(None),
            pending: spin::Mutex::new(VecDeque::new()),
            completed: spin::Mutex::new(Vec::new()),
        }
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::Relaxed)
    }

    pub fn fail_next_init(&self) {
        self.fail_next_init.store(true, Ordering::Relaxed);
    }

    /// Enabled lines, ascending.
    pub fn enabled(&self) -> Vec<IrqId> {
        let mut enabled = self.enabled.lock().clone();
        enabled.sort_unstable();
        enabled
    }

    /// Whether IRQs were masked while the last line was being enabled.
    pub fn masked_during_enable(&self) -> Option<bool> {
        *self.masked_during_enable.lock()
    }

    /// Marks `irq` pending.
    pub fn raise(&self, irq: IrqId) {
        self.pending.lock().push_back(irq);
    }

    /// Lines completed so far, in order.
    pub fn completed(&self) -> Vec<IrqId> {
        self.completed.lock().clone()
    }

    fn reset(&self) {
        self.inits.store(0, Ordering::Relaxed);
        self.fail_next_init.store(false, Ordering::Relaxed);
        self.enabled.lock().clear();
        *self.masked_during_enable.lock() = None;
        self.pending.lock().clear();
        self.completed.lock().clear();
    }
}

impl InterruptController for MockController {
    fn initialize(&self) -> PortResult<()> {
        self.inits.fetch_add(1, Ordering::Relaxed);
        if self.fail_next_init.swap(false, Ordering::Relaxed) {
            anyhow::bail!("distributor did not respond");
        }
        self.enabled.lock().clear();
        Ok(())
    }

    fn enable(&self, irq: IrqId) -> PortResult<()> {
        *self.masked_during_enable.lock() = Some(!sim::irqs_enabled());
        let mut enabled = self.enabled.lock();
        if !enabled.contains(&irq) {
            enabled.push(irq);
        }
        Ok(())
    }

    fn disable(&self, irq: IrqId) -> PortResult<()> {
        self.enabled.lock().retain(|&line| line != irq);
        Ok(())
    }

    fn claim(&self) -> Option<IrqId> {
        self.pending.lock().pop_front()
    }

    fn complete(&self, irq: IrqId) {
        self.completed.lock().push(irq);
    }
}

pub static KERNEL: MockKernel = MockKernel::new();
pub static TIMER: MockTimer = MockTimer::new();
pub static CONTROLLER: MockController = MockController::new();

static CONSOLE: Mutex<String> = Mutex::new(String::new());

fn capture(s: &str) {
    CONSOLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push_str(s);
}

/// Everything printed since the last [`reset`].
pub fn console_output() -> String {
    CONSOLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Plugs the mocks into the global port, console and IRQ manager.
pub fn install() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        PORT.install(&KERNEL, &TIMER);
        crate::console::init(capture);
        irq::register_controller(&CONTROLLER);
    });
}

/// Back to the state before the scheduler starts.
pub fn reset() {
    set_nesting(INITIAL_NESTING_VALUE);
    clear_current_task();
    sim::reset();
    PORT.reset_for_test();
    KERNEL.reset();
    TIMER.reset();
    CONTROLLER.reset();
    CONSOLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clear();
}

/// Allocates a stack, initializes it for `entry(argument)` and returns the
/// task's top-of-stack cell.
pub fn new_task(entry: TaskFunction, argument: usize) -> &'static TopOfStack {
    let words: &'static mut [usize] = Box::leak(vec![0usize; 256].into_boxed_slice());
    let top = StackRegion::new(words)
        .initialize(entry, argument)
        .expect("stack large enough");
    Box::leak(Box::new(TopOfStack::new(top)))
}
