//! Device drivers module.
//!
//! Hardware behind the port's collaborator traits: the interrupt controller,
//! the tick timer, and the console UART.

pub mod irq;
pub mod timer;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod uart;
