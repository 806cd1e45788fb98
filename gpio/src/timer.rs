//! One-shot timers running their callback on a dedicated thread.

use crate::GpioResult;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TimerState {
    Pending,
    Cancelled,
    Fired,
}

struct TimerShared {
    state: Mutex<TimerState>,
    changed: Condvar,
}

impl TimerShared {
    fn state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cancelable one-shot timer.
///
/// The callback runs on the timer's own thread once `delay` has passed, unless [Timer::cancel]
/// was called first. The decision to fire is made under the timer's lock, so a successful cancel
/// guarantees the callback never runs.
///
/// A callback that has already been let through may still be waiting on a lock its owner holds
/// while canceling. Owners that replace timers should tag each one (e.g. with a generation
/// counter) and ignore callbacks from timers they've since replaced.
pub struct Timer {
    name: String,
    shared: Arc<TimerShared>,
}

impl Timer {
    /// Starts a timer that calls `callback` after `delay`.
    pub fn start<F>(name: &str, delay: Duration, callback: F) -> GpioResult<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::Pending),
            changed: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let state = thread_shared.state();
                let (mut state, _) = thread_shared
                    .changed
                    .wait_timeout_while(state, delay, |state| *state == TimerState::Pending)
                    .unwrap_or_else(PoisonError::into_inner);
                if *state != TimerState::Pending {
                    return;
                }
                *state = TimerState::Fired;
                drop(state);

                callback();
            })?;

        Ok(Timer {
            name: name.to_string(),
            shared,
        })
    }

    /// Cancels the timer.
    ///
    /// Returns `true` if this call stopped the callback from running. Canceling a timer that has
    /// already fired or been canceled does nothing and returns `false`.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.state();
        if *state == TimerState::Pending {
            *state = TimerState::Cancelled;
            self.shared.changed.notify_all();
            true
        } else {
            false
        }
    }

    pub fn has_fired(&self) -> bool {
        *self.shared.state() == TimerState::Fired
    }
}

impl Debug for Timer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timer({}, {:?})", self.name, *self.shared.state())
    }
}
