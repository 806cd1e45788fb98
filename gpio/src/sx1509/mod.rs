//! Support for the SX1509 16-channel I/O expander, with its keypad scan engine and LED drivers.
//!
//! The keypad is wired to bank A (rows, I/O 0–3, driven as open-drain outputs) and bank B
//! (columns, I/O 8–10, inputs with pull-ups). The two LED pins share bank B with the columns:
//! I/O 14 drives the red LED and I/O 15 the green one. Every LED register access is therefore a
//! read-modify-write that leaves bits 0–5 of the bank B registers alone.
//!
//! # Sources
//!
//! - Semtech, [“SX1509 World's Lowest Voltage Level Shifting GPIO with LED Driver and Keypad
//!   Engine,”](https://www.semtech.com/products/smart-sensing/gpio-expanders/sx1509) Rev 2,
//!   Mar. 2011.

pub mod led;
pub mod registers;

pub use led::{LedColor, LedController, LedMode};

/// The default I²C address of the SX1509 with both address pins tied low.
pub const DEFAULT_ADDRESS: u8 = 0x3E;
