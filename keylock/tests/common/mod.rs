//! Common test utilities for the unlock cycle integration tests.
//!
//! Every test drives a real [Sx1509Keypad] over a [MockBus], with timings shortened so a whole
//! cycle runs in milliseconds.

#![allow(dead_code)]

use keylock::orchestrator::{OrchestratorConfig, UnlockOrchestrator};
use keylock::validator::{MatchId, PasscodeValidator};
use keylock_gpio::keypad::{KeypadConfig, Sx1509Keypad};
use keylock_gpio::mock::MockBus;
use keylock_gpio::{SharedBus, Signal};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// The only passcode the [RecordingValidator] accepts by default.
pub const VALID_CODE: &str = "1234";

/// Register of the red LED's on-time; a write of 0 here is the red cue.
pub const REG_RED_T_ON: u8 = 0x5F;

/// Register holding the key scan configuration; 0 while scanning is disabled.
pub const REG_KEY_CONFIG_2: u8 = 0x26;

/// A validator over a fixed passcode list that remembers every code it was asked about.
#[derive(Clone, Debug, Default)]
pub struct RecordingValidator {
    passcodes: Vec<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingValidator {
    pub fn new(passcodes: &[&str]) -> Self {
        RecordingValidator {
            passcodes: passcodes.iter().map(|code| code.to_string()).collect(),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PasscodeValidator for RecordingValidator {
    fn lookup(&self, code: &str) -> Option<MatchId> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(code.to_string());
        self.passcodes.iter().position(|passcode| passcode == code)
    }
}

pub fn fast_keypad_config() -> KeypadConfig {
    KeypadConfig {
        code_length: 4,
        inter_key_timeout: Duration::from_millis(100),
        reject_cue: Duration::from_millis(10),
        key_flash: Duration::ZERO,
        self_test: Duration::ZERO,
    }
}

pub fn fast_orchestrator_config(unlock_hold: Duration) -> OrchestratorConfig {
    OrchestratorConfig {
        unlock_hold,
        poll_interval: Duration::from_millis(20),
        accept_cue: Duration::ZERO,
    }
}

/// Everything a test needs to drive and observe one orchestrator.
pub struct Fixture {
    pub mock: MockBus,
    pub keypad: Sx1509Keypad,
    pub validator: RecordingValidator,
    pub remote: Arc<Signal>,
    pub orchestrator: UnlockOrchestrator<RecordingValidator>,
}

impl Fixture {
    /// Builds a started orchestrator accepting [VALID_CODE], with the write log cleared.
    pub fn new(unlock_hold: Duration) -> Self {
        Self::with_config(fast_orchestrator_config(unlock_hold))
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        let mock = MockBus::new();
        let keypad = Sx1509Keypad::init(SharedBus::new(mock.clone()), fast_keypad_config())
            .expect("keypad init failed");
        let validator = RecordingValidator::new(&[VALID_CODE]);
        let remote = Arc::new(Signal::new());
        let orchestrator = UnlockOrchestrator::new(
            keypad.clone(),
            validator.clone(),
            remote.clone(),
            config,
        );
        orchestrator.start().expect("orchestrator start failed");
        mock.clear_writes();

        Fixture { mock, keypad, validator, remote, orchestrator }
    }

    pub fn enter(&self, code: &str) {
        for key in code.chars() {
            self.keypad.append_key(key).expect("append_key failed");
        }
    }
}

pub fn red_cue_shown(mock: &MockBus) -> bool {
    mock.writes_to(REG_RED_T_ON).contains(&0x00)
}

/// Runs one cycle on a background thread. The thread hands the orchestrator back with the
/// outcome so the test can keep using it.
pub fn spawn_cycle(
    mut orchestrator: UnlockOrchestrator<RecordingValidator>,
) -> thread::JoinHandle<(
    UnlockOrchestrator<RecordingValidator>,
    keylock_gpio::GpioResult<keylock::orchestrator::UnlockOutcome>,
)> {
    thread::spawn(move || {
        let outcome = orchestrator.run_cycle();
        (orchestrator, outcome)
    })
}

/// Polls `condition` until it holds or `timeout` passes. Returns whether it held.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
