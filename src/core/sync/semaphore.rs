/*!
 * Counting Semaphore
 *
 * parking_lot mutex + condvar, as used by the condvar wait strategy
 */

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Counting semaphore
///
/// `up` never blocks; `down` blocks until the count is positive and then
/// decrements it.
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<u32>,
    condvar: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `value` permits
    pub fn new(value: u32) -> Self {
        Self {
            count: Mutex::new(value),
            condvar: Condvar::new(),
        }
    }

    /// Release one permit and wake one waiter
    pub fn up(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.condvar.notify_one();
    }

    /// Block until a permit is available, then take it
    pub fn down(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.condvar.wait(&mut count);
        }
        *count -= 1;
    }

    /// Take a permit if one is available without blocking
    pub fn try_down(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Like `down`, giving up after `timeout`
    ///
    /// Returns `true` if a permit was taken.
    pub fn down_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        while *count == 0 {
            if self.condvar.wait_for(&mut count, timeout).timed_out() {
                break;
            }
        }
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Current number of permits (diagnostics only)
    pub fn value(&self) -> u32 {
        *self.count.lock()
    }
}
