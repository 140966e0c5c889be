//! QEMU virt board support.

pub mod config;

use super::board::Board;

pub struct QemuVirt;

impl Board for QemuVirt {
    const NAME: &'static str = config::BOARD_NAME;
    const UART_PADDR: usize = config::UART_PADDR;
    const GICD_BASE: usize = config::GICD_BASE;
    const GICR_BASE: usize = config::GICR_BASE;
    const TIMER_IRQ: usize = config::TIMER_IRQ;

    fn init() {
        #[cfg(all(target_arch = "aarch64", target_os = "none"))]
        {
            use crate::drivers::{irq, uart};

            uart::init(memory_addr::VirtAddr::from(Self::UART_PADDR));
            crate::console::init(uart::puts);
            irq::register_controller(&irq::GIC_CONTROLLER);
        }
        info!("board {} initialized", Self::NAME);
    }
}
