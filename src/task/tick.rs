//! Tick interrupt bridge.
//!
//! With run-time statistics enabled the timer fires
//! [`RUN_TIME_STATS_MULTIPLIER`] times per kernel tick. Every interrupt
//! advances the statistics counter; only one in each group of
//! [`RUN_TIME_STATS_MULTIPLIER`] advances the kernel clock.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::kernel::RUN_TIME_STATS_MULTIPLIER;
use crate::port::PORT;

/// What a timer interrupt turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// Advances the kernel's logical clock.
    Engine,
    /// Only feeds the run-time statistics counter.
    Stats,
}

/// Counters behind the tick multiplexing.
pub struct TickBridge {
    run_time_stats: bool,
    /// Statistics time base; wraps.
    counter: AtomicU32,
    /// Interrupts since the last engine tick. Kept apart from `counter` so
    /// the ratio stays exact when `counter` wraps.
    phase: AtomicU32,
}

impl TickBridge {
    pub const fn new(run_time_stats: bool) -> Self {
        Self {
            run_time_stats,
            counter: AtomicU32::new(0),
            phase: AtomicU32::new(0),
        }
    }

    /// Whether statistics multiplexing is on.
    pub fn run_time_stats(&self) -> bool {
        self.run_time_stats
    }

    /// Accounts one timer interrupt and decides its kind.
    ///
    /// Only called from the timer interrupt, so there is a single writer.
    pub fn classify(&self) -> TickKind {
        if !self.run_time_stats {
            return TickKind::Engine;
        }

        self.counter.fetch_add(1, Ordering::Relaxed);
        let phase = self.phase.load(Ordering::Relaxed) + 1;
        if phase >= RUN_TIME_STATS_MULTIPLIER {
            self.phase.store(0, Ordering::Relaxed);
            TickKind::Engine
        } else {
            self.phase.store(phase, Ordering::Relaxed);
            TickKind::Stats
        }
    }

    /// Current value of the statistics time base.
    pub fn run_time_counter(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Restarts the statistics time base from 0.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
        self.phase.store(0, Ordering::Relaxed);
    }

    #[cfg(test)]
    fn set_counter(&self, value: u32) {
        self.counter.store(value, Ordering::Relaxed);
    }
}

/// Handler installed on the tick timer's interrupt line.
pub fn tick_handler(_irq: usize) {
    PORT.on_tick_interrupt();
}
