//! Timer drivers.

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod generic_timer;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use generic_timer::{GENERIC_TIMER, GenericTimer, current_ticks};
