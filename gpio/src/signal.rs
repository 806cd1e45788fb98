use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A binary flag that threads can set, clear and wait on.
///
/// Waiters are woken as soon as the flag changes, but every wait is bounded by a timeout so the
/// caller can re-check other conditions.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<bool>,
    changed: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, bool> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self) {
        self.store(true);
    }

    pub fn clear(&self) {
        self.store(false);
    }

    fn store(&self, value: bool) {
        let mut state = self.state();
        if *state != value {
            *state = value;
            self.changed.notify_all();
        }
    }

    pub fn is_set(&self) -> bool {
        *self.state()
    }

    /// Waits up to `timeout` for the flag to be set. Returns whether it is set.
    pub fn wait_set(&self, timeout: Duration) -> bool {
        self.wait_for(true, timeout)
    }

    /// Waits up to `timeout` for the flag to be cleared. Returns whether it is cleared.
    pub fn wait_cleared(&self, timeout: Duration) -> bool {
        !self.wait_for(false, timeout)
    }

    fn wait_for(&self, value: bool, timeout: Duration) -> bool {
        let state = self.state();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |state| *state != value)
            .unwrap_or_else(PoisonError::into_inner);
        *state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn set_and_clear() {
        let signal = Signal::new();
        assert!(!signal.is_set());
        signal.set();
        signal.set();
        assert!(signal.is_set());
        signal.clear();
        assert!(!signal.is_set());
    }

    #[test]
    fn wait_set_times_out() {
        let signal = Signal::new();
        let start = Instant::now();
        assert!(!signal.wait_set(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn wait_set_wakes_on_set() {
        let signal = Arc::new(Signal::new());
        let setter = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });

        let start = Instant::now();
        assert!(signal.wait_set(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn wait_cleared_returns_immediately_when_clear() {
        let signal = Signal::new();
        assert!(signal.wait_cleared(Duration::from_secs(5)));
    }
}
