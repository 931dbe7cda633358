use std::time::{Duration, Instant};

/// Trailing-edge debouncer driven by caller-supplied instants.
///
/// The first value ever pushed is applied immediately. After that each push
/// replaces any pending value and restarts the delay, so a burst of pushes
/// yields exactly one applied value once the burst goes quiet. Nothing runs
/// in the background: the owner polls with [`Debouncer::poll`], typically at
/// [`Debouncer::deadline`].
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    applied: Option<T>,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            applied: None,
            pending: None,
        }
    }

    /// Returns `true` when the value was applied right away.
    pub fn push(&mut self, value: T, at: Instant) -> bool {
        if self.applied.is_none() && self.pending.is_none() {
            self.applied = Some(value);
            return true;
        }
        self.pending = Some((value, at + self.delay));
        false
    }

    /// Apply the pending value if its delay has elapsed.
    pub fn poll(&mut self, at: Instant) -> bool {
        let ready = self.pending.as_ref().is_some_and(|(_, due)| *due <= at);
        ready && self.flush()
    }

    /// Apply the pending value now, regardless of the delay.
    pub fn flush(&mut self) -> bool {
        match self.pending.take() {
            Some((value, _)) => {
                self.applied = Some(value);
                true
            }
            None => false,
        }
    }

    /// Drop the pending value without applying it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The value currently in effect.
    pub fn value(&self) -> Option<&T> {
        self.applied.as_ref()
    }

    /// The most recent value pushed, applied or not.
    pub fn latest(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value).or(self.applied.as_ref())
    }
}
