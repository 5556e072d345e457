//! Cancelable debounce timer driven by explicit instants.

use crate::time::{Duration, Instant};

/// Holds the latest value of a burst until the burst has been quiet for
/// `window`.
///
/// The timer never reads the clock; callers pass `now` in, which keeps it
/// usable from a frame loop and testable without sleeping.
#[derive(Debug, Clone)]
pub struct DebounceTimer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> DebounceTimer<T> {
    /// Create an idle timer.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Quiescence window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Store `value` and restart the window from `now`, replacing anything
    /// already pending.
    pub fn arm(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    /// Drop the pending value without firing.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    /// Take the pending value immediately, ignoring the deadline.
    pub fn fire(&mut self) -> Option<T> {
        self.cancel()
    }

    /// Take the pending value if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<T> {
        if self.is_due(now) { self.fire() } else { None }
    }

    /// Whether a value is waiting.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether a value is waiting and its deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|(_, deadline)| *deadline <= now)
    }

    /// When the pending value will fire.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// The pending value.
    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }
}
