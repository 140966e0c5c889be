//! Interrupt controller registration surface.
//!
//! The board registers one [`InterruptController`] at start-up. It is
//! brought up lazily, the first time anything touches an interrupt line,
//! and at most once however many callers get there.

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod gicv3;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use gicv3::{GIC_CONTROLLER, GicV3Controller};

use anyhow::{Context, ensure};
use lazyinit::LazyInit;
use spin::Once;

use crate::PortResult;
use crate::config::kernel::MAX_IRQ_COUNT;
use crate::hal::Mutex;
use crate::task::CriticalSection;

/// Numeric interrupt id as the controller numbers its lines.
pub type IrqId = usize;

/// A standard handler; receives the callback reference it was installed with.
pub type IrqHandler = fn(usize);

/// A fast-path handler, called with no argument.
pub type FastIrqHandler = fn();

/// Hardware interface of an interrupt controller.
pub trait InterruptController: Sync {
    /// Brings the controller to a known state with every line disabled.
    fn initialize(&self) -> PortResult<()>;

    fn enable(&self, irq: IrqId) -> PortResult<()>;

    fn disable(&self, irq: IrqId) -> PortResult<()>;

    /// Acknowledges the highest-priority pending interrupt, if any.
    fn claim(&self) -> Option<IrqId>;

    /// Signals the end of servicing `irq`.
    fn complete(&self, irq: IrqId);
}

#[derive(Clone, Copy)]
enum IrqEntry {
    Standard { handler: IrqHandler, callback_ref: usize },
    Fast(FastIrqHandler),
}

/// A controller together with its handler table.
pub struct IrqManager {
    controller: &'static dyn InterruptController,
    ready: Once<()>,
    handlers: Mutex<[Option<IrqEntry>; MAX_IRQ_COUNT]>,
}

impl IrqManager {
    pub const fn new(controller: &'static dyn InterruptController) -> Self {
        Self {
            controller,
            ready: Once::new(),
            handlers: Mutex::new([None; MAX_IRQ_COUNT]),
        }
    }

    fn check_range(irq: IrqId) -> PortResult<()> {
        ensure!(
            irq < MAX_IRQ_COUNT,
            "IRQ {} out of range (max {})",
            irq,
            MAX_IRQ_COUNT - 1
        );
        Ok(())
    }

    /// Initializes the controller unless that already succeeded.
    ///
    /// A failed attempt leaves the manager uninitialized, so the next call
    /// tries again.
    pub fn ensure_initialized(&self) -> PortResult<()> {
        self.ready.try_call_once(|| {
            self.controller
                .initialize()
                .context("interrupt controller initialization failed")?;
            info!("interrupt controller initialized");
            Ok::<(), anyhow::Error>(())
        })?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.is_completed()
    }

    /// Enables an interrupt line.
    pub fn enable(&self, irq: IrqId) -> PortResult<()> {
        Self::check_range(irq)?;
        self.ensure_initialized()?;
        // The controller updates its enable registers read-modify-write.
        let _cs = CriticalSection::enter();
        self.controller.enable(irq)?;
        debug!("IRQ {} enabled", irq);
        Ok(())
    }

    /// Disables an interrupt line.
    pub fn disable(&self, irq: IrqId) -> PortResult<()> {
        Self::check_range(irq)?;
        self.ensure_initialized()?;
        self.controller.disable(irq)?;
        debug!("IRQ {} disabled", irq);
        Ok(())
    }

    /// Installs a standard handler, replacing any previous one.
    pub fn install_handler(
        &self,
        irq: IrqId,
        handler: IrqHandler,
        callback_ref: usize,
    ) -> PortResult<()> {
        Self::check_range(irq)?;
        self.ensure_initialized()?;
        self.handlers.lock()[irq] = Some(IrqEntry::Standard {
            handler,
            callback_ref,
        });
        debug!("IRQ {} handler installed", irq);
        Ok(())
    }

    /// Installs a fast-path handler, replacing any previous one.
    pub fn install_fast_handler(&self, irq: IrqId, handler: FastIrqHandler) -> PortResult<()> {
        Self::check_range(irq)?;
        self.ensure_initialized()?;
        self.handlers.lock()[irq] = Some(IrqEntry::Fast(handler));
        debug!("IRQ {} fast handler installed", irq);
        Ok(())
    }

    /// Removes the handler of `irq`, if any.
    pub fn remove_handler(&self, irq: IrqId) -> PortResult<()> {
        Self::check_range(irq)?;
        self.handlers.lock()[irq] = None;
        debug!("IRQ {} handler removed", irq);
        Ok(())
    }

    /// Services every pending interrupt. Called from the IRQ vector.
    pub fn dispatch(&self) {
        while let Some(irq) = self.controller.claim() {
            trace!("Handling IRQ {}", irq);
            // Release the table before calling out.
            let entry = self.handlers.lock().get(irq).copied().flatten();
            match entry {
                Some(IrqEntry::Standard {
                    handler,
                    callback_ref,
                }) => handler(callback_ref),
                Some(IrqEntry::Fast(handler)) => handler(),
                None => warn!("No handler registered for IRQ {}", irq),
            }
            self.controller.complete(irq);
        }
    }
}

static IRQ_MANAGER: LazyInit<IrqManager> = LazyInit::new();

/// Registers the board's interrupt controller. Initialization itself is
/// deferred to the first use.
///
/// # Panics
/// If a controller is already registered.
pub fn register_controller(controller: &'static dyn InterruptController) {
    IRQ_MANAGER.init_once(IrqManager::new(controller));
}

pub fn is_registered() -> bool {
    IRQ_MANAGER.is_inited()
}

fn manager() -> PortResult<&'static IrqManager> {
    IRQ_MANAGER
        .get()
        .context("no interrupt controller registered")
}

/// Initializes the registered controller if nobody has yet.
pub fn init() -> PortResult<()> {
    manager()?.ensure_initialized()
}

pub fn enable_interrupt(irq: IrqId) -> PortResult<()> {
    manager()?.enable(irq)
}

pub fn disable_interrupt(irq: IrqId) -> PortResult<()> {
    manager()?.disable(irq)
}

pub fn install_interrupt_handler(
    irq: IrqId,
    handler: IrqHandler,
    callback_ref: usize,
) -> PortResult<()> {
    manager()?.install_handler(irq, handler, callback_ref)
}

pub fn install_fast_interrupt_handler(irq: IrqId, handler: FastIrqHandler) -> PortResult<()> {
    manager()?.install_fast_handler(irq, handler)
}

pub fn remove_interrupt_handler(irq: IrqId) -> PortResult<()> {
    manager()?.remove_handler(irq)
}

/// IRQ vector entry: services every pending interrupt.
pub fn dispatch() {
    match IRQ_MANAGER.get() {
        Some(manager) => manager.dispatch(),
        None => warn!("IRQ taken with no interrupt controller registered"),
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_support::{self, MockController};

    static SEEN_REF: AtomicUsize = AtomicUsize::new(0);
    static FAST_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn record(callback_ref: usize) {
        SEEN_REF.store(callback_ref, Ordering::Relaxed);
    }

    fn fast() {
        FAST_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    fn leaked_manager() -> (&'static MockController, &'static IrqManager) {
        let controller: &'static MockController = Box::leak(Box::new(MockController::new()));
        let manager = Box::leak(Box::new(IrqManager::new(controller)));
        (controller, manager)
    }

    #[test]
    fn test_initialized_lazily_and_once() {
        let _guard = test_support::serial();
        test_support::reset();
        let (controller, manager) = leaked_manager();
        assert!(!manager.is_initialized());
        assert_eq!(controller.inits(), 0);

        manager.install_handler(40, record, 7).unwrap();
        manager.enable(40).unwrap();
        manager.ensure_initialized().unwrap();
        manager.ensure_initialized().unwrap();

        assert!(manager.is_initialized());
        assert_eq!(controller.inits(), 1);
        assert_eq!(controller.enabled(), vec![40]);
    }

    #[test]
    fn test_failed_init_is_retried() {
        let _guard = test_support::serial();
        test_support::reset();
        let (controller, manager) = leaked_manager();
        controller.fail_next_init();

        let err = manager.enable(33).unwrap_err();
        assert!(format!("{err:#}").contains("initialization failed"));
        assert!(!manager.is_initialized());
        assert!(controller.enabled().is_empty());

        manager.enable(33).unwrap();
        assert_eq!(controller.inits(), 2);
        assert_eq!(controller.enabled(), vec![33]);
    }

    #[test]
    fn test_out_of_range_ids_are_rejected() {
        let _guard = test_support::serial();
        test_support::reset();
        let (controller, manager) = leaked_manager();
        assert!(manager.enable(MAX_IRQ_COUNT).is_err());
        assert!(manager.disable(MAX_IRQ_COUNT + 5).is_err());
        assert!(manager.install_handler(MAX_IRQ_COUNT, record, 0).is_err());
        assert!(manager.install_fast_handler(usize::MAX, fast).is_err());
        // Rejected before touching the hardware.
        assert_eq!(controller.inits(), 0);
    }

    #[test]
    fn test_enable_runs_in_critical_section() {
        let _guard = test_support::serial();
        test_support::reset();
        crate::task::critical::set_nesting(0);
        crate::arch::enable_irqs();
        let (controller, manager) = leaked_manager();

        manager.enable(12).unwrap();
        assert_eq!(controller.masked_during_enable(), Some(true));
        assert!(crate::arch::irqs_enabled());
        manager.disable(12).unwrap();
        assert!(controller.enabled().is_empty());
    }

    #[test]
    fn test_dispatch_services_every_pending_line() {
        let _guard = test_support::serial();
        test_support::reset();
        let (controller, manager) = leaked_manager();
        SEEN_REF.store(0, Ordering::Relaxed);
        FAST_CALLS.store(0, Ordering::Relaxed);

        manager.install_handler(40, record, 0xbeef).unwrap();
        manager.install_fast_handler(41, fast).unwrap();
        controller.raise(41);
        controller.raise(40);
        controller.raise(99);
        manager.dispatch();

        assert_eq!(SEEN_REF.load(Ordering::Relaxed), 0xbeef);
        assert_eq!(FAST_CALLS.load(Ordering::Relaxed), 1);
        assert_eq!(controller.completed(), vec![41, 40, 99]);

        manager.remove_handler(41).unwrap();
        controller.raise(41);
        manager.dispatch();
        assert_eq!(FAST_CALLS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_global_surface_uses_registered_controller() {
        let _guard = test_support::serial();
        test_support::install();
        test_support::reset();
        assert!(is_registered());

        let controller = &test_support::CONTROLLER;
        init().unwrap();
        // An earlier test may already have brought the global manager up.
        let inits = controller.inits();
        assert!(inits <= 1);
        enable_interrupt(50).unwrap();
        install_fast_interrupt_handler(50, fast).unwrap();

        // A second init must not re-run the controller, which would drop the
        // enabled line.
        init().unwrap();
        assert_eq!(controller.inits(), inits);
        assert_eq!(controller.enabled(), vec![50]);

        FAST_CALLS.store(0, Ordering::Relaxed);
        controller.raise(50);
        dispatch();
        assert_eq!(FAST_CALLS.load(Ordering::Relaxed), 1);

        disable_interrupt(50).unwrap();
        assert!(controller.enabled().is_empty());
        remove_interrupt_handler(50).unwrap();
    }
}
