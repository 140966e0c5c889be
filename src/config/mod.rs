//! Port configuration.

pub mod kernel;
