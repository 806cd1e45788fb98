pub mod bus;
pub mod gpiod;
pub mod keypad;
pub mod mock;
pub mod signal;
pub mod sx1509;
pub mod timer;

use std::fmt::Debug;
use thiserror::Error;

pub use bus::{I2cRegisterBus, SharedBus};
pub use signal::Signal;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("bus communication failed: {0}")]
    Communication(String),
    #[error("invalid argument")]
    InvalidArgument,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// A register-oriented serial bus talking to a single chip at a fixed address.
///
/// This is the only hardware I/O primitive the chip drivers use. Implementations must not
/// retry on failure; any transport-level error is reported as [GpioError::Communication].
pub trait RegisterBus: Debug {
    /// Reads a single byte from the given register.
    fn read_byte(&mut self, register: u8) -> GpioResult<u8>;

    /// Writes a single byte to the given register.
    fn write_byte(&mut self, register: u8, value: u8) -> GpioResult<()>;
}

/// A hardware interrupt line that signals on a falling edge.
pub trait InterruptLine: Debug + Send {
    /// Blocks until the next falling edge is seen on the line.
    fn wait_falling_edge(&mut self) -> GpioResult<()>;
}
