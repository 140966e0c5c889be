//! Architecture primitives.
//!
//! Bare-metal AArch64 builds get the real exception vectors, context
//! save/restore sequences and the yield trampoline. Every other target gets
//! a simulated processor exposing the same functions, which is what the
//! host test suite runs against.
//!
//! Both provide:
//! - `current_status`, `irqs_enabled`, `disable_irqs`, `enable_irqs`
//! - `small_data_area`
//! - `start_first_task`, `yield_trap`, `park`

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod aarch64;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use aarch64::*;

#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub mod sim;
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub use sim::{
    current_status, disable_irqs, enable_irqs, irqs_enabled, park, small_data_area,
    start_first_task, yield_trap,
};
