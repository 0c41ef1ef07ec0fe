use std::thread;
use std::time::{Duration, Instant};

/// Milliseconds on a monotonic timeline.
pub type Millis = u64;

/// Source of monotonic time for everything in the control loop.
///
/// The loop never sleeps on its own; every cadence (blink, re-tone, upload
/// gate, environment gate) is a delta against `now()`. `delay` is only used
/// on the blocking serial path.
pub trait Clock {
    fn now(&self) -> Millis;
    fn delay(&self, ms: Millis);
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }

    fn delay(&self, ms: Millis) {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Hand-driven clock shared between the code under test and its mocks.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: std::rc::Rc<std::cell::Cell<Millis>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: Millis) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get() + ms);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.get()
    }

    fn delay(&self, ms: Millis) {
        self.advance(ms);
    }
}
