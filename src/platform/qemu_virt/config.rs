//! QEMU virt board configuration.

pub const BOARD_NAME: &str = "QEMU virt";

/// QEMU virt board constants.
pub const UART_PADDR: usize = 0x0900_0000;
pub const GICD_BASE: usize = 0x0800_0000;
pub const GICR_BASE: usize = 0x080a_0000;

/// EL1 physical timer, PPI 14.
pub const TIMER_IRQ: usize = 30;
