//! ARM Generic Timer driver.
//!
//! Uses the EL1 physical timer in down-counting mode: every interrupt is
//! acknowledged by reloading the countdown with the tick interval.

use core::sync::atomic::{AtomicU64, Ordering};

use aarch64_cpu::registers::{CNTFRQ_EL0, CNTP_CTL_EL0, CNTP_TVAL_EL0, CNTPCT_EL0};
use aarch64_cpu::registers::{Readable, Writeable};
use anyhow::{Context, ensure};

use crate::PortResult;
use crate::config::kernel::{RUN_TIME_STATS, RUN_TIME_STATS_MULTIPLIER, TICKS_PER_SEC};
use crate::drivers::irq;
use crate::platform::{CurrentBoard, board::Board};
use crate::port::TickTimer;
use crate::task::tick_handler;

/// Get current hardware timer ticks.
pub fn current_ticks() -> u64 {
    CNTPCT_EL0.get()
}

/// Timer interrupts per second: the tick rate, times the statistics
/// multiplier when statistics share the timer.
pub const fn interrupts_per_sec() -> u64 {
    if RUN_TIME_STATS {
        TICKS_PER_SEC as u64 * RUN_TIME_STATS_MULTIPLIER as u64
    } else {
        TICKS_PER_SEC as u64
    }
}

pub struct GenericTimer {
    /// Counter ticks between two interrupts; 0 until set up.
    interval: AtomicU64,
}

impl GenericTimer {
    pub const fn new() -> Self {
        Self {
            interval: AtomicU64::new(0),
        }
    }
}

impl Default for GenericTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TickTimer for GenericTimer {
    fn setup(&self) -> PortResult<()> {
        let freq = CNTFRQ_EL0.get();
        ensure!(freq != 0, "CNTFRQ_EL0 is not programmed");
        let interval = freq / interrupts_per_sec();
        ensure!(
            interval > 0 && interval <= u32::MAX as u64,
            "timer interval {} out of range for {} Hz",
            interval,
            freq
        );
        self.interval.store(interval, Ordering::Relaxed);

        irq::install_interrupt_handler(CurrentBoard::TIMER_IRQ, tick_handler, 0)
            .context("failed to install the tick handler")?;
        CNTP_TVAL_EL0.set(interval);
        CNTP_CTL_EL0.write(CNTP_CTL_EL0::ENABLE::SET);
        irq::enable_interrupt(CurrentBoard::TIMER_IRQ)?;

        info!(
            "tick timer: {} Hz counter, {} interrupts/s",
            freq,
            interrupts_per_sec()
        );
        Ok(())
    }

    fn clear_interrupt(&self) {
        CNTP_TVAL_EL0.set(self.interval.load(Ordering::Relaxed));
    }
}

/// The tick source boards install.
pub static GENERIC_TIMER: GenericTimer = GenericTimer::new();
