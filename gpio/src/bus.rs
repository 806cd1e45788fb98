//! Register bus implementations.
//!
//! [I2cRegisterBus] adapts any `embedded-hal` I²C bus into a [RegisterBus], and [SharedBus] wraps a
//! bus so it can be used from several threads at once, one logical operation at a time.

use crate::{GpioError, GpioResult, RegisterBus};
use embedded_hal::i2c::{Error as _, I2c};
use linux_embedded_hal::I2cdev;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A [RegisterBus] over I²C, addressing a single chip.
pub struct I2cRegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cRegisterBus<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl I2cRegisterBus<I2cdev> {
    /// Opens a Linux I²C character device (like `/dev/i2c-1`) and talks to the chip at `address`.
    pub fn open(path: impl AsRef<Path>, address: u8) -> GpioResult<Self> {
        let i2c = I2cdev::new(path).map_err(|err| GpioError::Communication(err.to_string()))?;
        Ok(Self::new(i2c, address))
    }
}

impl<I2C> Debug for I2cRegisterBus<I2C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "I2cRegisterBus(0x{:02X})", self.address)
    }
}

impl<I2C: I2c> RegisterBus for I2cRegisterBus<I2C> {
    fn read_byte(&mut self, register: u8) -> GpioResult<u8> {
        let mut buffer = [0u8];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(|err| GpioError::Communication(format!("read 0x{:02X}: {:?}", register, err.kind())))?;
        trace!("Read register 0x{:02X} = 0x{:02X}", register, buffer[0]);
        Ok(buffer[0])
    }

    fn write_byte(&mut self, register: u8, value: u8) -> GpioResult<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|err| GpioError::Communication(format!("write 0x{:02X}: {:?}", register, err.kind())))?;
        trace!("Wrote register 0x{:02X} = 0x{:02X}", register, value);
        Ok(())
    }
}

/// A clonable handle to a [RegisterBus] shared between threads.
///
/// Every method holds the bus for the whole logical operation, so a read-modify-write or a
/// register sequence is never interleaved with another thread's access.
#[derive(Clone)]
pub struct SharedBus {
    inner: Arc<Mutex<Box<dyn RegisterBus + Send>>>,
}

impl SharedBus {
    pub fn new(bus: impl RegisterBus + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(bus))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn RegisterBus + Send>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, register: u8) -> GpioResult<u8> {
        self.lock().read_byte(register)
    }

    pub fn write(&self, register: u8, value: u8) -> GpioResult<()> {
        self.lock().write_byte(register, value)
    }

    /// Writes the `(register, value)` pairs in order, stopping at the first failure.
    pub fn write_all(&self, writes: &[(u8, u8)]) -> GpioResult<()> {
        let mut bus = self.lock();
        for &(register, value) in writes {
            bus.write_byte(register, value)?;
        }
        Ok(())
    }

    /// Reads a register, transforms its value with `f` and writes it back.
    pub fn modify(&self, register: u8, f: impl FnOnce(u8) -> u8) -> GpioResult<()> {
        let mut bus = self.lock();
        let value = bus.read_byte(register)?;
        bus.write_byte(register, f(value))
    }

    /// Runs `f` with exclusive access to the bus.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut dyn RegisterBus) -> GpioResult<T>) -> GpioResult<T> {
        let mut bus = self.lock();
        f(&mut **bus)
    }
}

impl Debug for SharedBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedBus")
    }
}
