//! # Scheduler Module
//!
//! Single-threaded cooperative scheduling. Nothing here spawns a thread or
//! blocks: the host (a GUI frame subscription, or a test) calls into the
//! sessions once per display refresh and every timer is polled from there.
//!
//! - [`FrameScheduler`] holds at most one pending frame tick. A loop runs a
//!   tick only after taking the pending request, and requests the next one
//!   at the end, so ticks never overlap.
//! - [`Timeout`] is a cancellable one-shot deadline (re-arming debounces).
//! - [`Interval`] fires on a fixed period, catching up after long frames.
//! - [`Clock`] abstracts the time source so tests can drive time by hand.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds since an arbitrary origin.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Wall clock, measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Identifier of a requested frame tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(u64);

/// At most one outstanding "run me on the next frame" request.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: Option<TickId>,
    next_id: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a tick on the next frame. Requesting twice before the
    /// frame runs returns the same id.
    pub fn request(&mut self) -> TickId {
        if let Some(id) = self.pending {
            return id;
        }
        self.next_id += 1;
        let id = TickId(self.next_id);
        self.pending = Some(id);
        id
    }

    /// Drops the pending request, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Consumes the pending request; the caller then runs exactly one tick.
    pub fn take(&mut self) -> Option<TickId> {
        self.pending.take()
    }
}

/// Cancellable one-shot deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timeout {
    deadline: Option<f64>,
}

impl Timeout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the timeout to fire `delay_ms` after `now`.
    pub fn arm(&mut self, now: f64, delay_ms: f64) {
        self.deadline = Some(now + delay_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    /// Returns `true` once when the deadline has passed, then disarms.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Fixed-period repeating timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    period_ms: f64,
    next: Option<f64>,
}

impl Interval {
    pub fn new(period_ms: f64) -> Self {
        Self {
            period_ms: period_ms.max(1.0),
            next: None,
        }
    }

    pub fn start(&mut self, now: f64) {
        self.next = Some(now + self.period_ms);
    }

    pub fn cancel(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Number of periods elapsed since the last poll.
    pub fn poll(&mut self, now: f64) -> u32 {
        let Some(mut next) = self.next else {
            return 0;
        };
        let mut fired = 0;
        while now >= next {
            fired += 1;
            next += self.period_ms;
        }
        self.next = Some(next);
        fired
    }
}
