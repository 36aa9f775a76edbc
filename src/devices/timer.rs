/*!
 * Timer
 *
 * Tick counter plus the sleep queue it drives. Each `tick` is one timer
 * interrupt: the counter advances and every sleeper whose wake-up tick has
 * arrived is unblocked, in wake-up order.
 */

use crate::core::sync::Semaphore;
use crate::core::types::Ticks;
use parking_lot::Mutex;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

struct Sleeper {
    wake_at: Ticks,
    seq: u64,
    signal: Arc<Semaphore>,
}

impl PartialEq for Sleeper {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Sleeper {}

impl PartialOrd for Sleeper {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sleeper {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.wake_at, self.seq).cmp(&(other.wake_at, other.seq))
    }
}

/// System timer
pub struct Timer {
    freq: u32,
    ticks: AtomicI64,
    seq: AtomicU64,
    sleepers: Mutex<BinaryHeap<Reverse<Sleeper>>>,
    /// Set at power off; sleeping no longer blocks
    off: AtomicBool,
    stop: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// Create a timer interrupting `freq` times per second
    pub fn new(freq: u32) -> Arc<Self> {
        Arc::new(Self {
            freq,
            ticks: AtomicI64::new(0),
            seq: AtomicU64::new(0),
            sleepers: Mutex::new(BinaryHeap::new()),
            off: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            ticker: Mutex::new(None),
        })
    }

    pub fn frequency(&self) -> u32 {
        self.freq
    }

    /// Ticks since boot
    pub fn ticks(&self) -> Ticks {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Ticks elapsed since `then`, a value once returned by `ticks`
    pub fn elapsed(&self, then: Ticks) -> Ticks {
        self.ticks() - then
    }

    /// Block the calling thread for about `ticks` timer ticks
    pub fn sleep(&self, ticks: Ticks) {
        if ticks <= 0 {
            return;
        }

        let signal = Arc::new(Semaphore::new(0));
        {
            let mut sleepers = self.sleepers.lock();
            if self.off.load(Ordering::SeqCst) {
                return;
            }
            sleepers.push(Reverse(Sleeper {
                wake_at: self.ticks() + ticks,
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
                signal: Arc::clone(&signal),
            }));
        }
        signal.down();
    }

    /// Sleep for about `ms` milliseconds
    pub fn msleep(&self, ms: i64) {
        self.real_time_sleep(ms, 1000);
    }

    /// Sleep for about `us` microseconds
    pub fn usleep(&self, us: i64) {
        self.real_time_sleep(us, 1000 * 1000);
    }

    /// One timer interrupt
    pub fn tick(&self) {
        let now = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;

        let mut sleepers = self.sleepers.lock();
        while sleepers
            .peek()
            .is_some_and(|Reverse(sleeper)| sleeper.wake_at <= now)
        {
            if let Some(Reverse(sleeper)) = sleepers.pop() {
                sleeper.signal.up();
            }
        }
    }

    /// Stop the ticker and release every sleeper; later sleeps return at once
    pub fn power_off(&self) {
        self.stop_ticker();

        let mut sleepers = self.sleepers.lock();
        self.off.store(true, Ordering::SeqCst);
        let woken = sleepers.len();
        for Reverse(sleeper) in sleepers.drain() {
            sleeper.signal.up();
        }
        debug!(woken, "Timer powered off");
    }

    pub fn is_off(&self) -> bool {
        self.off.load(Ordering::SeqCst)
    }

    /// Threads currently blocked in `sleep`
    pub fn sleeper_count(&self) -> usize {
        self.sleepers.lock().len()
    }

    /// Drive the timer from a background thread at the configured frequency
    pub fn start_ticker(self: &Arc<Self>) -> std::io::Result<()> {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return Ok(());
        }

        self.stop.store(false, Ordering::SeqCst);
        let period = Duration::from_nanos(1_000_000_000 / u64::from(self.freq));
        let timer: Weak<Timer> = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name("timer".into())
            .spawn(move || loop {
                thread::sleep(period);
                match timer.upgrade() {
                    Some(timer) if !timer.stop.load(Ordering::SeqCst) => timer.tick(),
                    _ => break,
                }
            })?;

        *ticker = Some(handle);
        info!(freq = self.freq, "Timer ticker started");
        Ok(())
    }

    /// Stop the background ticker, if running
    pub fn stop_ticker(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.ticker.lock().take() {
            let _ = handle.join();
            debug!(ticks = self.ticks(), "Timer ticker stopped");
        }
    }

    /// Sleep for NUM/DENOM seconds, rounding down to whole ticks
    fn real_time_sleep(&self, num: i64, denom: i64) {
        let ticks = num * i64::from(self.freq) / denom;
        if ticks > 0 {
            self.sleep(ticks);
        } else if num > 0 {
            // Less than one tick: delay without queueing
            let nanos = num.saturating_mul(1_000_000_000 / denom);
            thread::sleep(Duration::from_nanos(nanos as u64));
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
