//! Register addresses and fixed configuration values of the SX1509.
//!
//! Bank B covers I/O 8–15, bank A covers I/O 0–7.

/// Software reset. Writing [RESET_SEQUENCE] in order resets the chip.
pub const REG_RESET: u8 = 0x7D;
pub const RESET_SEQUENCE: [u8; 2] = [0x12, 0x34];

/// Clock management.
pub const REG_CLOCK: u8 = 0x1E;
/// Internal 2 MHz oscillator.
pub const CLOCK_ENABLE: u8 = 0x50;

/// Miscellaneous configuration, holds the LED clock divider.
pub const REG_MISC: u8 = 0x1F;
/// LED clock = oscillator / 8 (250 kHz).
pub const MISC_LED_CLOCK: u8 = 0x40;

pub const REG_INPUT_DISABLE_B: u8 = 0x00;
pub const REG_PULL_UP_B: u8 = 0x06;
pub const REG_OPEN_DRAIN_B: u8 = 0x0A;
pub const REG_OPEN_DRAIN_A: u8 = 0x0B;
/// Direction, `1` = input.
pub const REG_DIR_B: u8 = 0x0E;
pub const REG_DIR_A: u8 = 0x0F;
/// Output data of bank B. For LED pins, `0` turns the LED on.
pub const REG_DATA_B: u8 = 0x10;
pub const REG_LED_DRIVER_ENABLE_B: u8 = 0x20;

/// Debounce time shared by all debounced inputs.
pub const REG_DEBOUNCE_CONFIG: u8 = 0x22;
/// 16 ms at the 2 MHz clock.
pub const DEBOUNCE_16MS: u8 = 0x05;
pub const REG_DEBOUNCE_ENABLE_B: u8 = 0x23;

/// Key scan timing: bits 2:0 scan time per row (must exceed the debounce time), bits 6:4 auto-sleep.
pub const REG_KEY_CONFIG_1: u8 = 0x25;
/// 32 ms per row, auto-sleep off.
pub const KEY_SCAN_TIMING: u8 = 0x05;
/// Key matrix size: bits 5:3 rows - 1 (non-zero enables scanning), bits 2:0 columns - 1.
pub const REG_KEY_CONFIG_2: u8 = 0x26;
/// 4 rows, 3 columns, scanning enabled.
pub const KEY_MATRIX_4X3: u8 = 0x1A;
pub const KEY_SCAN_DISABLED: u8 = 0x00;

/// Column of the last pressed key, active-low.
pub const REG_KEY_DATA_1: u8 = 0x27;
/// Row of the last pressed key, active-low.
pub const REG_KEY_DATA_2: u8 = 0x28;

/// Keypad rows on bank A: all outputs, open-drain.
pub const ROWS_OUTPUT: u8 = 0x00;
pub const ROWS_OPEN_DRAIN: u8 = 0xFF;
/// Keypad columns on bank B (I/O 8–13): inputs with pull-ups and debouncing.
pub const COLUMNS_MASK: u8 = 0x3F;

/// The two LED pins (I/O 14 and 15) within the bank B registers.
pub const LED_PINS_MASK: u8 = 0xC0;

/// LED timing registers of I/O 14 (red). Green (I/O 15) follows at [REG_LED_GREEN_BASE].
pub const REG_LED_RED_BASE: u8 = 0x5F;
pub const REG_LED_GREEN_BASE: u8 = 0x64;
/// Offsets of the LED timing registers from their base.
pub const LED_T_ON: u8 = 0;
pub const LED_I_ON: u8 = 1;
pub const LED_T_OFF: u8 = 2;

/// `T_ON` of zero keeps the LED on steadily instead of blinking.
pub const LED_T_ON_STEADY: u8 = 0x00;
pub const LED_BLINK_T_ON: u8 = 0x05;
pub const LED_BLINK_I_ON: u8 = 0xFF;
/// Off time in bits 7:3, off intensity in bits 2:0.
pub const LED_BLINK_OFF: u8 = 0x40;
