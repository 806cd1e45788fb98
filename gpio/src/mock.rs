//! Test doubles for the hardware traits.
//!
//! [MockBus] is an in-memory register file that records every write, and [MockInterruptLine]
//! is an interrupt line fired from a [MockInterruptTrigger]. Both let the drivers run without
//! the real expander attached.

use crate::{GpioError, GpioResult, InterruptLine, RegisterBus};
use std::fmt::{Debug, Formatter};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct MockBusState {
    registers: [u8; 256],
    writes: Vec<(u8, u8)>,
    fail_on: Option<u8>,
}

/// An in-memory [RegisterBus].
///
/// Clones share the same register file, so a test can keep one clone for inspection while the
/// driver owns another.
#[derive(Clone)]
pub struct MockBus {
    state: Arc<Mutex<MockBusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockBusState {
                registers: [0; 256],
                writes: Vec::new(),
                fail_on: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockBusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets the current value of a register.
    pub fn register(&self, register: u8) -> u8 {
        self.state().registers[register as usize]
    }

    /// Sets a register without recording a write, as the chip itself would.
    pub fn set_register(&self, register: u8, value: u8) {
        self.state().registers[register as usize] = value;
    }

    /// Gets every `(register, value)` write in order.
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state().writes.clone()
    }

    /// Gets the values written to one register, in order.
    pub fn writes_to(&self, register: u8) -> Vec<u8> {
        self.state()
            .writes
            .iter()
            .filter(|(r, _)| *r == register)
            .map(|&(_, value)| value)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    /// Makes every access to `register` fail with [GpioError::Communication].
    pub fn fail_on(&self, register: Option<u8>) {
        self.state().fail_on = register;
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MockBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockBus")
    }
}

impl RegisterBus for MockBus {
    fn read_byte(&mut self, register: u8) -> GpioResult<u8> {
        let state = self.state();
        if state.fail_on == Some(register) {
            return Err(GpioError::Communication(format!("read 0x{:02X}: mock failure", register)));
        }
        Ok(state.registers[register as usize])
    }

    fn write_byte(&mut self, register: u8, value: u8) -> GpioResult<()> {
        let mut state = self.state();
        if state.fail_on == Some(register) {
            return Err(GpioError::Communication(format!("write 0x{:02X}: mock failure", register)));
        }
        state.registers[register as usize] = value;
        state.writes.push((register, value));
        Ok(())
    }
}

/// An [InterruptLine] fired programmatically through a [MockInterruptTrigger].
pub struct MockInterruptLine {
    edges: Receiver<()>,
}

impl MockInterruptLine {
    pub fn new() -> (Self, MockInterruptTrigger) {
        let (tx, rx) = mpsc::channel();
        (MockInterruptLine { edges: rx }, MockInterruptTrigger { edges: tx })
    }
}

impl Debug for MockInterruptLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockInterruptLine")
    }
}

impl InterruptLine for MockInterruptLine {
    fn wait_falling_edge(&mut self) -> GpioResult<()> {
        self.edges
            .recv()
            .map_err(|_| GpioError::Other("interrupt trigger dropped".to_string()))
    }
}

/// Fires falling edges on the paired [MockInterruptLine]. Dropping it closes the line.
#[derive(Clone, Debug)]
pub struct MockInterruptTrigger {
    edges: Sender<()>,
}

impl MockInterruptTrigger {
    pub fn fire(&self) {
        // The line may already be gone when its worker stopped; nothing to deliver to then.
        let _ = self.edges.send(());
    }
}
