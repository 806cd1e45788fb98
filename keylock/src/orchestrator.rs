//! The module for the unlock cycle state machine.
//!
//! [UnlockOrchestrator] waits for a complete code from the keypad (or a remote unlock), validates
//! it, gives LED feedback and re-arms the keypad. While an unlock is being held, an external
//! consumer (e.g. the door actuator) observes it through an [UnlockHandle] and acknowledges it
//! with [UnlockHandle::clear_unlock_hold].

use crate::remote::RemoteUnlockSignal;
use crate::validator::{MatchId, PasscodeValidator};
use keylock_gpio::keypad::Sx1509Keypad;
use keylock_gpio::sx1509::{LedColor, LedController};
use keylock_gpio::timer::Timer;
use keylock_gpio::{GpioResult, Signal};
use log::{debug, error, info, warn};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Timing of the unlock cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrchestratorConfig {
    /// How long an unlock is held before the next cycle starts on its own.
    pub unlock_hold: Duration,
    /// Upper bound between re-checks while waiting for a code or for the hold to clear.
    pub poll_interval: Duration,
    /// How long the green LED is shown after a successful unlock before waiting on the hold.
    pub accept_cue: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            unlock_hold: Duration::from_secs(90),
            poll_interval: Duration::from_millis(500),
            accept_cue: Duration::from_secs(2),
        }
    }
}

/// The phase of the unlock cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum UnlockPhase {
    /// Waiting for a complete code or a remote unlock.
    #[default] AwaitingCode,
    /// Scanning is disabled and the code is being checked.
    Evaluating,
    /// Access was granted and is being held.
    Unlocked,
    /// The code was rejected; the keypad is about to be re-armed.
    Rejected,
}

/// Where an unlock request came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnlockSource {
    Keypad,
    Remote,
}

/// The result of one unlock cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnlockOutcome {
    /// A keypad code matched the stored passcode with the given id.
    Keypad(MatchId),
    /// The unlock was approved remotely.
    Remote,
    /// The keypad code didn't match any stored passcode.
    Rejected,
}

/// The expiry timer of the current unlock hold.
#[derive(Debug, Default)]
struct ExpirySlot {
    timer: Option<Timer>,
    generation: u64,
}

impl ExpirySlot {
    fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

struct UnlockSession {
    phase: Mutex<UnlockPhase>,
    hold: Signal,
    expiry: Mutex<ExpirySlot>,
    leds: LedController,
}

/// A clonable view of the unlock session for external consumers.
#[derive(Clone)]
pub struct UnlockHandle {
    session: Arc<UnlockSession>,
}

impl UnlockHandle {
    fn new(leds: LedController) -> Self {
        UnlockHandle {
            session: Arc::new(UnlockSession {
                phase: Mutex::new(UnlockPhase::default()),
                hold: Signal::new(),
                expiry: Mutex::new(ExpirySlot::default()),
                leds,
            }),
        }
    }

    fn expiry(&self) -> MutexGuard<'_, ExpirySlot> {
        self.session.expiry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> UnlockPhase {
        *self.session.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: UnlockPhase) {
        debug!("Unlock phase: {:?}", phase);
        *self.session.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Gets whether an unlock is currently being held.
    pub fn is_unlocked(&self) -> bool {
        self.session.hold.is_set()
    }

    /// Waits up to `timeout` for an unlock. Returns whether one is being held.
    pub fn wait_unlocked(&self, timeout: Duration) -> bool {
        self.session.hold.wait_set(timeout)
    }

    /// Gets whether the hold will still expire on its own.
    pub fn is_expiry_pending(&self) -> bool {
        self.expiry().timer.as_ref().is_some_and(|timer| !timer.has_fired())
    }

    /// Acknowledges the unlock so the next cycle can start right away.
    ///
    /// Cancels the hold's expiry timer, clears the hold and turns both LEDs off. Calling this
    /// when nothing is held does nothing.
    pub fn clear_unlock_hold(&self) -> GpioResult<()> {
        let mut expiry = self.expiry();
        expiry.cancel();
        if !self.session.hold.is_set() {
            return Ok(());
        }

        info!("Unlock hold cleared.");
        self.session.hold.clear();
        self.session.leds.all_off()
    }

    /// Withdraws an unlock that couldn't be fully set up: no expiry, no hold, LEDs off. LED
    /// failures are only logged, since the caller is already failing with the original error.
    fn abort_hold(&self) {
        let mut expiry = self.expiry();
        expiry.cancel();
        self.session.hold.clear();
        if let Err(err) = self.session.leds.all_off() {
            error!("Failed to turn LEDs off while aborting unlock: {}", err);
        }
    }

    /// Blinks the red LED to show that the door has been left unlocked.
    pub fn warn_left_unlocked(&self) -> GpioResult<()> {
        warn!("Door left unlocked.");
        self.session.leds.blink_on(LedColor::Red)
    }

    /// Arms the expiry timer, then sets the hold. The timer can't run its callback before the
    /// hold is set, since that needs the expiry lock held here.
    fn hold(&self, duration: Duration) -> GpioResult<()> {
        let mut expiry = self.expiry();
        expiry.cancel();

        let generation = expiry.generation;
        let session = Arc::downgrade(&self.session);
        expiry.timer = Some(Timer::start("unlock-hold-expiry", duration, move || {
            if let Some(session) = session.upgrade() {
                UnlockHandle { session }.expire(generation);
            }
        })?);
        self.session.hold.set();
        Ok(())
    }

    /// Called by the expiry timer.
    fn expire(&self, generation: u64) {
        let mut expiry = self.expiry();
        if expiry.generation != generation {
            return;
        }
        expiry.cancel();
        if !self.session.hold.is_set() {
            return;
        }

        info!("Unlock hold expired.");
        self.session.hold.clear();
        if let Err(err) = self.session.leds.all_off() {
            error!("Failed to turn LEDs off after unlock hold expired: {}", err);
        }
    }

    /// Blocks until the hold is cleared, re-checking every `poll_interval`.
    fn wait_released(&self, poll_interval: Duration) {
        while !self.session.hold.wait_cleared(poll_interval) {}
    }
}

impl Debug for UnlockHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockHandle({:?}, unlocked: {})", self.phase(), self.is_unlocked())
    }
}

/// The unlock cycle state machine.
///
/// `AwaitingCode → Evaluating → {Unlocked, Rejected} → AwaitingCode`, forever. Runs on a single
/// thread; only the unlock hold is shared with other threads, through [UnlockHandle].
pub struct UnlockOrchestrator<V: PasscodeValidator> {
    keypad: Sx1509Keypad,
    validator: V,
    remote: Arc<dyn RemoteUnlockSignal>,
    handle: UnlockHandle,
    config: OrchestratorConfig,
}

impl<V: PasscodeValidator> UnlockOrchestrator<V> {
    pub fn new(
        keypad: Sx1509Keypad,
        validator: V,
        remote: Arc<dyn RemoteUnlockSignal>,
        config: OrchestratorConfig,
    ) -> Self {
        let handle = UnlockHandle::new(keypad.leds().clone());
        UnlockOrchestrator {
            keypad,
            validator,
            remote,
            handle,
            config,
        }
    }

    pub fn handle(&self) -> UnlockHandle {
        self.handle.clone()
    }

    pub fn keypad(&self) -> &Sx1509Keypad {
        &self.keypad
    }

    /// Arms the keypad for the first code.
    pub fn start(&self) -> GpioResult<()> {
        self.keypad.begin_read_cycle(false)
    }

    /// Runs unlock cycles until the keypad can no longer be re-armed.
    ///
    /// A bus error fails only the cycle it happened in: it is logged and the keypad is re-armed
    /// from scratch. If re-arming fails as well, the error is returned.
    pub fn run(&mut self) -> GpioResult<()> {
        info!("Unlock orchestrator started.");
        self.start()?;

        loop {
            match self.run_cycle() {
                Ok(outcome) => debug!("Unlock cycle finished: {:?}", outcome),
                Err(err) => {
                    error!("Unlock cycle failed: {}", err);
                    self.handle.set_phase(UnlockPhase::AwaitingCode);
                    self.keypad.begin_read_cycle(false)?;
                }
            }
        }
    }

    /// Runs a single unlock cycle, from waiting for a code to re-arming the keypad.
    ///
    /// If the unlock is granted, this blocks until the hold is cleared or expires.
    pub fn run_cycle(&mut self) -> GpioResult<UnlockOutcome> {
        self.handle.set_phase(UnlockPhase::AwaitingCode);
        let source = self.await_code()?;

        self.handle.set_phase(UnlockPhase::Evaluating);
        self.keypad.set_scanning(false)?;
        let outcome = self.evaluate(source);

        let show_rejection = match outcome {
            UnlockOutcome::Rejected => {
                warn!("Incorrect code entered.");
                self.handle.set_phase(UnlockPhase::Rejected);
                true
            }
            UnlockOutcome::Keypad(id) => {
                info!("Unlocked with passcode #{}.", id);
                self.unlock()?;
                false
            }
            UnlockOutcome::Remote => {
                info!("Unlocked remotely.");
                self.unlock()?;
                false
            }
        };

        self.keypad.begin_read_cycle(show_rejection)?;
        Ok(outcome)
    }

    /// Waits until a code is complete or a remote unlock arrives. A complete code wins when both
    /// are pending. A bus failure in the keypad's background threads ends the wait with an error.
    fn await_code(&self) -> GpioResult<UnlockSource> {
        loop {
            if let Some(err) = self.keypad.take_fault() {
                return Err(err);
            }
            if self.keypad.is_code_complete() {
                return Ok(UnlockSource::Keypad);
            }
            if self.remote.is_set() {
                return Ok(UnlockSource::Remote);
            }
            self.keypad.wait_for_code(self.config.poll_interval);
        }
    }

    fn evaluate(&self, source: UnlockSource) -> UnlockOutcome {
        match source {
            UnlockSource::Keypad => {
                let code = self.keypad.code();
                match self.validator.lookup(&code) {
                    Some(id) => UnlockOutcome::Keypad(id),
                    None => UnlockOutcome::Rejected,
                }
            }
            UnlockSource::Remote => {
                self.remote.clear();
                UnlockOutcome::Remote
            }
        }
    }

    /// Shows the green LED, then publishes the hold. Nothing is left held if either step fails.
    fn unlock(&self) -> GpioResult<()> {
        self.handle.set_phase(UnlockPhase::Unlocked);
        let published = self
            .keypad
            .leds()
            .steady_on(LedColor::Green)
            .and_then(|()| self.handle.hold(self.config.unlock_hold));
        if let Err(err) = published {
            self.handle.abort_hold();
            self.handle.set_phase(UnlockPhase::AwaitingCode);
            return Err(err);
        }
        thread::sleep(self.config.accept_cue);

        self.handle.wait_released(self.config.poll_interval);
        Ok(())
    }
}

impl<V: PasscodeValidator> Debug for UnlockOrchestrator<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockOrchestrator({:?}, {:?}, {:?})", self.keypad, self.validator, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keylock_gpio::mock::MockBus;
    use keylock_gpio::sx1509::LedMode;
    use keylock_gpio::SharedBus;

    fn handle() -> UnlockHandle {
        let leds = LedController::init(SharedBus::new(MockBus::new())).unwrap();
        UnlockHandle::new(leds)
    }

    #[test]
    fn hold_expires_on_its_own() {
        let handle = handle();
        handle.hold(Duration::from_millis(50)).unwrap();
        assert!(handle.is_unlocked());
        assert!(handle.is_expiry_pending());

        assert!(handle.session.hold.wait_cleared(Duration::from_secs(2)));
        assert!(!handle.is_expiry_pending());
    }

    #[test]
    fn clear_cancels_expiry() {
        let handle = handle();
        handle.hold(Duration::from_secs(60)).unwrap();

        handle.clear_unlock_hold().unwrap();

        assert!(!handle.is_unlocked());
        assert!(!handle.is_expiry_pending());
    }

    #[test]
    fn clear_is_idempotent() {
        let handle = handle();
        handle.hold(Duration::from_secs(60)).unwrap();

        handle.clear_unlock_hold().unwrap();
        handle.clear_unlock_hold().unwrap();
        assert!(!handle.is_unlocked());
    }

    #[test]
    fn stale_expiry_does_not_clear_a_new_hold() {
        let handle = handle();
        handle.hold(Duration::from_secs(60)).unwrap();
        let stale = handle.expiry().generation;
        handle.clear_unlock_hold().unwrap();
        handle.hold(Duration::from_secs(60)).unwrap();

        handle.expire(stale);

        assert!(handle.is_unlocked());
        assert!(handle.is_expiry_pending());
    }

    #[test]
    fn abort_withdraws_hold_and_leds() {
        let handle = handle();
        handle.session.leds.steady_on(LedColor::Green).unwrap();
        handle.hold(Duration::from_secs(60)).unwrap();

        handle.abort_hold();

        assert!(!handle.is_unlocked());
        assert!(!handle.is_expiry_pending());
        assert_eq!(handle.session.leds.mode(LedColor::Green).unwrap(), LedMode::Off);
    }

    #[test]
    fn left_unlocked_warning_blinks_red() {
        let handle = handle();
        handle.warn_left_unlocked().unwrap();
        assert_eq!(handle.session.leds.mode(LedColor::Red).unwrap(), LedMode::Blink);
    }
}
