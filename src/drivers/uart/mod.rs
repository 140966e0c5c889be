//! UART drivers.

pub mod pl011;

pub use pl011::{init, puts};
