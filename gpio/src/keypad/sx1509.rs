use crate::keypad::{KeyScan, KeypadKey};
use crate::sx1509::registers::*;
use crate::sx1509::{LedColor, LedController};
use crate::timer::Timer;
use crate::{GpioError, GpioResult, InterruptLine, SharedBus, Signal};
use log::{debug, error, info, warn};
use std::fmt::{Debug, Formatter};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How many raw scans can wait for the decode thread before new ones are dropped.
const SCAN_QUEUE_CAPACITY: usize = 8;

/// Timing and length rules for code entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeypadConfig {
    /// Number of keys in a complete code.
    pub code_length: usize,
    /// How long the user may pause between keys before the partial code is thrown away.
    pub inter_key_timeout: Duration,
    /// How long the red LED stays on to show that a code was rejected or expired.
    pub reject_cue: Duration,
    /// How long the green LED flashes to acknowledge a key. Zero disables the flash.
    pub key_flash: Duration,
    /// How long both LEDs stay on during the startup self-test.
    pub self_test: Duration,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        KeypadConfig {
            code_length: 4,
            inter_key_timeout: Duration::from_secs(6),
            reject_cue: Duration::from_millis(1500),
            key_flash: Duration::from_millis(250),
            self_test: Duration::from_secs(4),
        }
    }
}

/// The code being entered, and the timer that throws it away if the user stops typing.
#[derive(Debug, Default)]
struct CodeEntry {
    code: Vec<char>,
    timer: Option<Timer>,
    /// Bumped whenever the timer is canceled, so a callback that was already firing can tell it
    /// has been replaced.
    generation: u64,
}

impl CodeEntry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

struct KeypadShared {
    bus: SharedBus,
    leds: LedController,
    config: KeypadConfig,
    entry: Mutex<CodeEntry>,
    complete: Signal,
    /// The first bus failure from a background thread that no one has picked up yet.
    fault: Mutex<Option<GpioError>>,
}

/// A 4x3 keypad scanned by the SX1509 key engine, plus the red/green status LED.
///
/// The driver accumulates decoded keys into a code of [KeypadConfig::code_length] characters.
/// Once the code is complete, the completion signal is set and further keys are ignored until
/// the code is reset. A partial code is reset automatically (with the red LED cue) when no key
/// arrives within [KeypadConfig::inter_key_timeout].
///
/// The handle is cheap to clone; all clones drive the same chip and share the same code.
#[derive(Clone)]
pub struct Sx1509Keypad {
    shared: Arc<KeypadShared>,
}

impl Sx1509Keypad {
    /// Resets the chip, configures the key scan engine and the LED drivers, and runs the LED
    /// self-test (both LEDs on for [KeypadConfig::self_test], then off). Scanning is enabled
    /// when this returns.
    pub fn init(bus: SharedBus, config: KeypadConfig) -> GpioResult<Self> {
        if config.code_length == 0 {
            return Err(GpioError::InvalidArgument);
        }

        debug!("Resetting SX1509...");
        bus.write_all(&[
            (REG_RESET, RESET_SEQUENCE[0]),
            (REG_RESET, RESET_SEQUENCE[1]),
        ])?;

        debug!("Configuring key scan engine...");
        bus.write_all(&[
            (REG_CLOCK, CLOCK_ENABLE),
            // Rows
            (REG_DIR_A, ROWS_OUTPUT),
            (REG_OPEN_DRAIN_A, ROWS_OPEN_DRAIN),
            // Columns
            (REG_DIR_B, COLUMNS_MASK),
            (REG_PULL_UP_B, COLUMNS_MASK),
            (REG_DEBOUNCE_CONFIG, DEBOUNCE_16MS),
            (REG_DEBOUNCE_ENABLE_B, COLUMNS_MASK),
            (REG_KEY_CONFIG_1, KEY_SCAN_TIMING),
            (REG_KEY_CONFIG_2, KEY_MATRIX_4X3),
        ])?;

        let leds = LedController::init(bus.clone())?;

        debug!("LED self-test...");
        leds.steady_on(LedColor::Red)?;
        leds.steady_on(LedColor::Green)?;
        thread::sleep(config.self_test);
        leds.off(LedColor::Green)?;
        leds.off(LedColor::Red)?;

        Ok(Sx1509Keypad {
            shared: Arc::new(KeypadShared {
                bus,
                leds,
                config,
                entry: Mutex::new(CodeEntry::default()),
                complete: Signal::new(),
                fault: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &KeypadConfig {
        &self.shared.config
    }

    pub fn leds(&self) -> &LedController {
        &self.shared.leds
    }

    fn entry(&self) -> MutexGuard<'_, CodeEntry> {
        self.shared.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fault(&self) -> MutexGuard<'_, Option<GpioError>> {
        self.shared.fault.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a failure from the interrupt, decode or timer threads. Later failures are dropped
    /// until the first one is taken.
    fn report_fault(&self, err: GpioError) {
        let mut fault = self.fault();
        if fault.is_none() {
            *fault = Some(err);
        }
    }

    /// Takes the pending background failure, if any.
    ///
    /// Bus errors in the background threads can't be returned to anyone, so they are kept here
    /// until the code consumer picks them up and fails its cycle.
    pub fn take_fault(&self) -> Option<GpioError> {
        self.fault().take()
    }

    /// Gets the code entered so far.
    pub fn code(&self) -> String {
        self.entry().code.iter().collect()
    }

    /// Gets whether a complete code has been entered and is waiting to be picked up.
    pub fn is_code_complete(&self) -> bool {
        self.shared.complete.is_set()
    }

    /// Waits up to `timeout` for a complete code. Returns whether one is available.
    pub fn wait_for_code(&self, timeout: Duration) -> bool {
        self.shared.complete.wait_set(timeout)
    }

    /// Appends a key to the code.
    ///
    /// Returns `false` without changing anything if the code is already complete; it stays that
    /// way until [Sx1509Keypad::reset]. Otherwise the inter-key timer is restarted, or the
    /// completion signal is set if this key completed the code.
    pub fn append_key(&self, key: char) -> GpioResult<bool> {
        let mut entry = self.entry();
        entry.cancel_timer();

        let code_length = self.shared.config.code_length;
        if entry.code.len() >= code_length {
            debug!("Code already complete, ignoring key.");
            return Ok(false);
        }

        entry.code.push(key);
        debug!("Code is now {} of {} keys long.", entry.code.len(), code_length);

        if entry.code.len() == code_length {
            self.shared.complete.set();
        } else {
            let generation = entry.generation;
            let shared = Arc::downgrade(&self.shared);
            entry.timer = Some(Timer::start(
                "keypad-inter-key",
                self.shared.config.inter_key_timeout,
                move || {
                    if let Some(shared) = shared.upgrade() {
                        Sx1509Keypad { shared }.expire(generation);
                    }
                },
            )?);
        }

        Ok(true)
    }

    /// Called by the inter-key timer.
    fn expire(&self, generation: u64) {
        let mut entry = self.entry();
        if entry.generation != generation {
            return;
        }

        info!("No key pressed in time, discarding partial code.");
        if let Err(err) = self.reset_locked(&mut entry, true) {
            error!("Failed to reset code after inter-key timeout: {}", err);
            self.report_fault(err);
        }
    }

    fn reset_locked(&self, entry: &mut CodeEntry, show_feedback: bool) -> GpioResult<()> {
        entry.cancel_timer();
        self.shared.complete.clear();
        entry.code.clear();

        let leds = &self.shared.leds;
        leds.all_off()?;
        if show_feedback {
            leds.pulse(LedColor::Red, self.shared.config.reject_cue)?;
        }
        Ok(())
    }

    /// Throws away the current code and clears the completion signal, turning both LEDs off.
    ///
    /// With `show_feedback`, the red LED is then pulsed for [KeypadConfig::reject_cue]; this
    /// blocks the caller for that long.
    pub fn reset(&self, show_feedback: bool) -> GpioResult<()> {
        let mut entry = self.entry();
        self.reset_locked(&mut entry, show_feedback)
    }

    /// Enables or disables the key scan engine. While disabled, no key presses are reported.
    pub fn set_scanning(&self, enabled: bool) -> GpioResult<()> {
        debug!("Key scanning {}.", if enabled { "enabled" } else { "disabled" });
        let value = if enabled { KEY_MATRIX_4X3 } else { KEY_SCAN_DISABLED };
        self.shared.bus.write(REG_KEY_CONFIG_2, value)
    }

    /// Starts a new code entry cycle: LEDs off, code reset (see [Sx1509Keypad::reset]) and
    /// scanning enabled. Background failures from before the re-arm are discarded.
    pub fn begin_read_cycle(&self, show_feedback: bool) -> GpioResult<()> {
        if let Some(err) = self.take_fault() {
            debug!("Discarding background failure before re-arming: {}", err);
        }
        self.shared.leds.all_off()?;
        self.reset(show_feedback)?;
        self.set_scanning(true)
    }

    /// Reads the key data registers, column first.
    pub fn read_scan(&self) -> GpioResult<KeyScan> {
        self.shared.bus.transaction(|bus| {
            let column_data = bus.read_byte(REG_KEY_DATA_1)?;
            let row_data = bus.read_byte(REG_KEY_DATA_2)?;
            Ok(KeyScan { column_data, row_data })
        })
    }

    /// Decodes a scan and appends the key to the code. Scans that don't decode to a key are
    /// ignored.
    pub fn handle_scan(&self, scan: KeyScan) -> GpioResult<Option<KeypadKey>> {
        let Some(key) = scan.decode() else {
            debug!("Ignoring scan that is not a single key: {:?}", scan);
            return Ok(None);
        };

        debug!("Key pressed.");
        let flash = self.shared.config.key_flash;
        if !flash.is_zero() {
            self.shared.leds.pulse(LedColor::Green, flash)?;
        }

        self.append_key(key.to_char())?;
        Ok(Some(key))
    }

    /// Handles one interrupt from the chip directly on the calling thread.
    pub fn on_interrupt(&self) -> GpioResult<Option<KeypadKey>> {
        let scan = self.read_scan()?;
        self.handle_scan(scan)
    }

    /// Starts handling interrupts from `line` in the background.
    ///
    /// The interrupt thread only reads the key data registers and queues the raw scan; a
    /// separate decode thread turns queued scans into keys. Both threads stop once the line
    /// fails.
    pub fn spawn_interrupt_worker(&self, line: impl InterruptLine + 'static) -> GpioResult<InterruptWorker> {
        let (tx, rx) = mpsc::sync_channel(SCAN_QUEUE_CAPACITY);

        let reader = self.clone();
        let interrupt = thread::Builder::new()
            .name("keypad-interrupt".to_string())
            .spawn(move || reader.interrupt_loop(line, tx))?;

        let decoder = self.clone();
        let decode = thread::Builder::new()
            .name("keypad-decode".to_string())
            .spawn(move || decoder.decode_loop(rx))?;

        Ok(InterruptWorker { interrupt, decode })
    }

    fn interrupt_loop(&self, mut line: impl InterruptLine, scans: SyncSender<KeyScan>) -> GpioResult<()> {
        debug!("Waiting for interrupts on {:?}...", line);
        loop {
            if let Err(err) = line.wait_falling_edge() {
                error!("Interrupt line {:?} failed: {}", line, err);
                return Err(err);
            }

            let scan = match self.read_scan() {
                Ok(scan) => scan,
                Err(err) => {
                    error!("Failed to read key data: {}", err);
                    self.report_fault(err);
                    continue;
                }
            };

            match scans.try_send(scan) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Scan queue full, dropping key press."),
                Err(TrySendError::Disconnected(_)) => return Ok(()),
            }
        }
    }

    fn decode_loop(&self, scans: Receiver<KeyScan>) {
        for scan in scans {
            if let Err(err) = self.handle_scan(scan) {
                error!("Failed to handle key press: {}", err);
                self.report_fault(err);
            }
        }
        debug!("Decode thread stopped.");
    }
}

impl Debug for Sx1509Keypad {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sx1509Keypad({:?}, {:?})", self.shared.bus, self.shared.config)
    }
}

/// The background threads started by [Sx1509Keypad::spawn_interrupt_worker].
#[derive(Debug)]
pub struct InterruptWorker {
    interrupt: JoinHandle<GpioResult<()>>,
    decode: JoinHandle<()>,
}

impl InterruptWorker {
    /// Waits for both threads to stop, returning the error that stopped the interrupt thread.
    pub fn join(self) -> GpioResult<()> {
        let result = self
            .interrupt
            .join()
            .map_err(|_| GpioError::Other("interrupt thread panicked".to_string()))?;
        self.decode
            .join()
            .map_err(|_| GpioError::Other("decode thread panicked".to_string()))?;
        result
    }
}
