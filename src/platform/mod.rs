//! Platform module - Board-specific configuration and support.
//!
//! A board supplies the addresses of its interrupt controller and console,
//! the interrupt line of its tick timer, and registers its drivers with the
//! port at start-up.

pub mod board;
pub mod qemu_virt;

// Select the current board based on compile-time features
#[cfg(feature = "qemu")]
pub type CurrentBoard = qemu_virt::QemuVirt;

#[cfg(not(feature = "qemu"))]
compile_error!("no board selected: enable the `qemu` feature");

/// Brings up the current board's console and interrupt controller.
pub fn init() {
    use board::Board;
    CurrentBoard::init();
}
