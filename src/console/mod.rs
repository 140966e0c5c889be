//! Console module - Print and logging facilities.
//!
//! This module provides console output and logging support.

#[macro_use]
pub mod print;

pub mod logger;

pub use logger::init as init_logger;
pub use print::{ConsoleSink, init, is_initialized};
