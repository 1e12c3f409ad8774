use core::time::Duration;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// A sleep policy driven by a [`ConsumptionThrottler`](crate::ConsumptionThrottler).
///
/// Methods take `&self` so a backoff can be shared between the worker that
/// sleeps in it and whoever needs to cut that sleep short.
pub trait Backoff: Send + Sync {
    /// Blocks the calling thread for the current timeout.
    fn backoff(&self);

    /// Grows the timeout for the next [`backoff`](Self::backoff).
    fn increase(&self);

    /// Returns the timeout to its base value.
    fn reset(&self);

    /// Wakes a thread blocked in [`backoff`](Self::backoff). Implementations
    /// that never block may ignore this.
    fn interrupt(&self) {}
}

impl<B: Backoff + ?Sized> Backoff for Arc<B> {
    fn backoff(&self) {
        (**self).backoff();
    }

    fn increase(&self) {
        (**self).increase();
    }

    fn reset(&self) {
        (**self).reset();
    }

    fn interrupt(&self) {
        (**self).interrupt();
    }
}

#[derive(Debug)]
struct Sleep {
    timeout: Duration,
    interrupted: bool,
}

/// Multiplies its timeout by `rate` on every increase, saturating at
/// `Duration::MAX` or at the configured ceiling.
///
/// The sleep is a condition-variable wait, so [`Backoff::interrupt`] ends it
/// early. An interrupt that arrives while nobody sleeps makes the next
/// [`Backoff::backoff`] return immediately.
#[derive(Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    rate: u32,
    ceiling: Option<Duration>,
    sleep: Mutex<Sleep>,
    wake: Condvar,
}

impl ExponentialBackoff {
    pub fn new(rate: u32, base: Duration) -> Self {
        Self {
            base,
            rate,
            ceiling: None,
            sleep: Mutex::new(Sleep {
                timeout: base,
                interrupted: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Caps every future timeout at `ceiling`.
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = Some(ceiling);
        let sleep = self.sleep.get_mut();
        sleep.timeout = sleep.timeout.min(ceiling);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.sleep.lock().timeout
    }

    pub const fn base(&self) -> Duration {
        self.base
    }
}

impl Backoff for ExponentialBackoff {
    fn backoff(&self) {
        let mut sleep = self.sleep.lock();
        if !sleep.interrupted {
            let timeout = sleep.timeout;
            self.wake
                .wait_while_for(&mut sleep, |s| !s.interrupted, timeout);
        }
        sleep.interrupted = false;
    }

    fn increase(&self) {
        let mut sleep = self.sleep.lock();
        let grown = sleep.timeout.checked_mul(self.rate).unwrap_or(Duration::MAX);
        sleep.timeout = match self.ceiling {
            Some(ceiling) => grown.min(ceiling),
            None => grown,
        };
    }

    fn reset(&self) {
        let mut sleep = self.sleep.lock();
        sleep.timeout = match self.ceiling {
            Some(ceiling) => self.base.min(ceiling),
            None => self.base,
        };
    }

    fn interrupt(&self) {
        self.sleep.lock().interrupted = true;
        self.wake.notify_all();
    }
}

/// Per-worker backoff settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base: Duration,
    pub rate: u32,
    pub ceiling: Option<Duration>,
}

impl BackoffConfig {
    pub fn build(&self) -> ExponentialBackoff {
        let backoff = ExponentialBackoff::new(self.rate, self.base);
        match self.ceiling {
            Some(ceiling) => backoff.with_ceiling(ceiling),
            None => backoff,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1),
            rate: 2,
            ceiling: Some(Duration::from_millis(250)),
        }
    }
}
