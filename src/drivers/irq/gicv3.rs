//! GICv3 (Generic Interrupt Controller version 3) driver.

use arm_gic::{
    IntId, UniqueMmioPointer,
    gicv3::{
        GicCpuInterface, GicV3, InterruptGroup,
        registers::{Gicd, GicrSgi},
    },
};
use core::ptr::NonNull;
use anyhow::{Context, anyhow, ensure};
use spin::Mutex;

use super::{InterruptController, IrqId};
use crate::PortResult;
use crate::platform::{CurrentBoard, board::Board};

/// Global GIC instance, present once initialized.
static GIC: Mutex<Option<GicV3>> = Mutex::new(None);

/// Highest id the distributor can deliver (1020..=1023 are special).
const MAX_INTID: IrqId = 1019;

fn to_intid(irq: IrqId) -> PortResult<IntId> {
    ensure!(irq <= MAX_INTID, "IRQ {} is not a GIC interrupt id", irq);
    let irq = irq as u32;
    Ok(match irq {
        0..16 => IntId::sgi(irq),
        16..32 => IntId::ppi(irq - 16),
        _ => IntId::spi(irq - 32),
    })
}

/// SGIs and PPIs are banked per core; only core 0 runs the kernel.
fn core_of(irq: IrqId) -> Option<usize> {
    if irq < 32 { Some(0) } else { None }
}

/// The board's GICv3, driven through the memory-mapped distributor and the
/// redistributor of core 0.
pub struct GicV3Controller;

impl GicV3Controller {
    fn set_enabled(&self, irq: IrqId, enable: bool) -> PortResult<()> {
        let intid = to_intid(irq)?;
        let mut gic = GIC.lock();
        let gic = gic.as_mut().context("GIC not initialized")?;
        gic.enable_interrupt(intid, core_of(irq), enable)
            .map_err(|_| anyhow!("GIC rejected IRQ {} (enable = {})", irq, enable))
    }
}

impl InterruptController for GicV3Controller {
    fn initialize(&self) -> PortResult<()> {
        let gicd_base_address = CurrentBoard::GICD_BASE as *mut Gicd;
        let gicr_base_address = CurrentBoard::GICR_BASE as *mut GicrSgi;

        let gicd = NonNull::new(gicd_base_address).context("GIC distributor base is null")?;
        let gicr = NonNull::new(gicr_base_address).context("GIC redistributor base is null")?;

        // SAFETY: the board maps the distributor and redistributor at these
        // addresses and nothing else drives them.
        let gicd = unsafe { UniqueMmioPointer::new(gicd) };
        let mut gic = unsafe { GicV3::new(gicd, gicr, 1, false) };
        gic.setup(0);

        *GIC.lock() = Some(gic);
        debug!(
            "GICv3 at {:#x}/{:#x}",
            CurrentBoard::GICD_BASE,
            CurrentBoard::GICR_BASE
        );
        Ok(())
    }

    fn enable(&self, irq: IrqId) -> PortResult<()> {
        self.set_enabled(irq, true)
    }

    fn disable(&self, irq: IrqId) -> PortResult<()> {
        self.set_enabled(irq, false)
    }

    fn claim(&self) -> Option<IrqId> {
        GicCpuInterface::get_and_acknowledge_interrupt(InterruptGroup::Group1)
            .map(|intid| u32::from(intid) as IrqId)
    }

    fn complete(&self, irq: IrqId) {
        match to_intid(irq) {
            Ok(intid) => GicCpuInterface::end_interrupt(intid, InterruptGroup::Group1),
            Err(e) => error!("cannot complete IRQ {}: {}", irq, e),
        }
    }
}

/// The controller instance boards register.
pub static GIC_CONTROLLER: GicV3Controller = GicV3Controller;
