//! Single-permit latch carrying one value from a releaser to a waiter.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

enum LatchState<T> {
    Waiting,
    Released(T),
    Taken,
}

/// One-shot handoff: the first `release` wins, later ones are ignored.
pub struct OneShotLatch<T> {
    state: Mutex<LatchState<T>>,
    condvar: Condvar,
}

impl<T> OneShotLatch<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LatchState::Waiting),
            condvar: Condvar::new(),
        }
    }

    /// Hands `value` to the waiter. Returns `false` if the latch was
    /// already released, in which case `value` is dropped.
    pub fn release(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, LatchState::Waiting) {
            return false;
        }
        *state = LatchState::Released(value);
        self.condvar.notify_all();
        true
    }

    pub fn is_released(&self) -> bool {
        !matches!(*self.state.lock(), LatchState::Waiting)
    }

    /// Blocks until a value is released or `timeout` elapses.
    ///
    /// Returns `None` on timeout, and also when another waiter has already
    /// taken the value.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while matches!(*state, LatchState::Waiting) {
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        match std::mem::replace(&mut *state, LatchState::Taken) {
            LatchState::Released(value) => Some(value),
            LatchState::Taken => None,
            LatchState::Waiting => {
                *state = LatchState::Waiting;
                None
            }
        }
    }
}

impl<T> Default for OneShotLatch<T> {
    fn default() -> Self {
        Self::new()
    }
}
