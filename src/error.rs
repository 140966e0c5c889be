//! Unified error types for the port layer.
//!
//! Every fallible port operation returns [`PortResult`], an alias for
//! `anyhow::Result`. Callers are expected to assert on failure: this layer
//! detects problems, it does not recover from them.
//!
//! ```ignore
//! anyhow::bail!("IRQ {} out of range", irq);
//! anyhow::ensure!(words >= MIN_STACK_WORDS, "stack too small");
//! controller.initialize().context("interrupt controller init failed")?;
//! ```

/// Result type alias using anyhow::Error.
pub type PortResult<T> = anyhow::Result<T>;
