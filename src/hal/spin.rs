//! Spin lock for data shared between tasks and interrupt handlers.

use core::sync::atomic::{AtomicBool, Ordering};

use lock_api::{GuardSend, RawMutex};

use crate::task::{enter_critical, exit_critical};

/// Raw lock that holds a critical section for as long as it is held.
///
/// Taking the lock counts as one level of critical nesting, so IRQs stay
/// masked until both the lock and every critical section entered under it
/// are released, in whichever order.
pub struct SpinNoIrq {
    locked: AtomicBool,
}

unsafe impl RawMutex for SpinNoIrq {
    type GuardMarker = GuardSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
    };

    fn lock(&self) {
        enter_critical();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        enter_critical();
        let acquired = self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if !acquired {
            exit_critical();
        }
        acquired
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        exit_critical();
    }
}

/// Mutex built on [`SpinNoIrq`].
pub type Mutex<T> = lock_api::Mutex<SpinNoIrq, T>;
