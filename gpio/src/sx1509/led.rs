use crate::sx1509::registers::*;
use crate::{GpioResult, SharedBus};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::thread;
use std::time::Duration;

/// The two colors of the status LED.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LedColor {
    /// The red LED, on I/O 14.
    Red,
    /// The green LED, on I/O 15.
    Green,
}

impl LedColor {
    /// Gets the bit of this LED's pin in the bank B registers.
    pub fn pin_mask(self) -> u8 {
        match self {
            LedColor::Red => 0x40,
            LedColor::Green => 0x80,
        }
    }

    fn register(self, offset: u8) -> u8 {
        let base = match self {
            LedColor::Red => REG_LED_RED_BASE,
            LedColor::Green => REG_LED_GREEN_BASE,
        };
        base + offset
    }
}

/// The feedback state of a single LED.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LedMode {
    #[default] Off,
    /// Continuously on.
    Steady,
    /// Blinking with the fixed blink parameters.
    Blink,
}

/// Drives the red and green LEDs through the SX1509 LED drivers.
///
/// Each color is controlled independently. All writes to shared bank B registers are
/// read-modify-write, so neither the other LED nor the keypad columns are disturbed.
#[derive(Clone)]
pub struct LedController {
    bus: SharedBus,
}

impl LedController {
    /// Configures both LED pins as open-drain outputs driven by the LED driver, and returns the
    /// controller. The LEDs are left in whatever state the chip was in.
    pub fn init(bus: SharedBus) -> GpioResult<Self> {
        debug!("Initializing LED drivers...");
        bus.modify(REG_INPUT_DISABLE_B, |value| value | LED_PINS_MASK)?;
        bus.modify(REG_PULL_UP_B, |value| value & !LED_PINS_MASK)?;
        bus.modify(REG_OPEN_DRAIN_B, |value| value | LED_PINS_MASK)?;
        bus.modify(REG_DIR_B, |value| value & !LED_PINS_MASK)?;
        bus.modify(REG_MISC, |value| value | MISC_LED_CLOCK)?;
        bus.modify(REG_LED_DRIVER_ENABLE_B, |value| value | LED_PINS_MASK)?;
        Ok(Self { bus })
    }

    /// Turns the LED on steadily.
    pub fn steady_on(&self, color: LedColor) -> GpioResult<()> {
        self.bus.transaction(|bus| {
            bus.write_byte(color.register(LED_T_ON), LED_T_ON_STEADY)?;
            let data = bus.read_byte(REG_DATA_B)?;
            bus.write_byte(REG_DATA_B, data & !color.pin_mask())
        })
    }

    /// Makes the LED blink.
    pub fn blink_on(&self, color: LedColor) -> GpioResult<()> {
        self.bus.transaction(|bus| {
            bus.write_byte(color.register(LED_T_ON), LED_BLINK_T_ON)?;
            bus.write_byte(color.register(LED_I_ON), LED_BLINK_I_ON)?;
            bus.write_byte(color.register(LED_T_OFF), LED_BLINK_OFF)?;
            let data = bus.read_byte(REG_DATA_B)?;
            bus.write_byte(REG_DATA_B, data & !color.pin_mask())
        })
    }

    /// Turns the LED off. The timing registers are left as they are.
    pub fn off(&self, color: LedColor) -> GpioResult<()> {
        self.bus.modify(REG_DATA_B, |value| value | color.pin_mask())
    }

    pub fn set(&self, color: LedColor, mode: LedMode) -> GpioResult<()> {
        match mode {
            LedMode::Off => self.off(color),
            LedMode::Steady => self.steady_on(color),
            LedMode::Blink => self.blink_on(color),
        }
    }

    /// Turns off both LEDs, green first.
    pub fn all_off(&self) -> GpioResult<()> {
        self.off(LedColor::Green)?;
        self.off(LedColor::Red)
    }

    /// Turns the LED on steadily for `duration`, then off. Blocks the calling thread meanwhile.
    pub fn pulse(&self, color: LedColor, duration: Duration) -> GpioResult<()> {
        self.steady_on(color)?;
        thread::sleep(duration);
        self.off(color)
    }

    /// Reads back the current state of the LED from the chip.
    pub fn mode(&self, color: LedColor) -> GpioResult<LedMode> {
        self.bus.transaction(|bus| {
            if bus.read_byte(REG_DATA_B)? & color.pin_mask() != 0 {
                return Ok(LedMode::Off);
            }
            Ok(match bus.read_byte(color.register(LED_T_ON))? {
                LED_T_ON_STEADY => LedMode::Steady,
                _ => LedMode::Blink,
            })
        })
    }
}

impl Debug for LedController {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedController({:?})", self.bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBus;

    fn controller() -> (LedController, MockBus) {
        let mock = MockBus::new();
        let leds = LedController::init(SharedBus::new(mock.clone())).unwrap();
        mock.clear_writes();
        (leds, mock)
    }

    #[test]
    fn init_preserves_unrelated_pins() {
        let mock = MockBus::new();
        mock.set_register(REG_INPUT_DISABLE_B, 0x05);
        mock.set_register(REG_PULL_UP_B, 0xFF);
        mock.set_register(REG_OPEN_DRAIN_B, 0x01);
        mock.set_register(REG_DIR_B, 0xFF);
        mock.set_register(REG_MISC, 0x02);
        mock.set_register(REG_LED_DRIVER_ENABLE_B, 0x00);

        LedController::init(SharedBus::new(mock.clone())).unwrap();

        assert_eq!(mock.register(REG_INPUT_DISABLE_B), 0xC5);
        assert_eq!(mock.register(REG_PULL_UP_B), 0x3F);
        assert_eq!(mock.register(REG_OPEN_DRAIN_B), 0xC1);
        assert_eq!(mock.register(REG_DIR_B), 0x3F);
        assert_eq!(mock.register(REG_MISC), 0x42);
        assert_eq!(mock.register(REG_LED_DRIVER_ENABLE_B), 0xC0);
    }

    #[test]
    fn steady_on_clears_only_its_own_bit() {
        let (leds, mock) = controller();
        mock.set_register(REG_DATA_B, 0xFF);

        leds.steady_on(LedColor::Red).unwrap();

        assert_eq!(mock.register(REG_DATA_B), 0xBF);
        assert_eq!(mock.register(0x5F), LED_T_ON_STEADY);
        assert_eq!(leds.mode(LedColor::Red).unwrap(), LedMode::Steady);
        assert_eq!(leds.mode(LedColor::Green).unwrap(), LedMode::Off);
    }

    #[test]
    fn blink_programs_timing_registers() {
        let (leds, mock) = controller();
        mock.set_register(REG_DATA_B, 0xFF);

        leds.blink_on(LedColor::Green).unwrap();

        assert_eq!(mock.register(0x64), 0x05);
        assert_eq!(mock.register(0x65), 0xFF);
        assert_eq!(mock.register(0x66), 0x40);
        assert_eq!(mock.register(REG_DATA_B), 0x7F);
        assert_eq!(leds.mode(LedColor::Green).unwrap(), LedMode::Blink);
    }

    #[test]
    fn off_leaves_timing_alone() {
        let (leds, mock) = controller();
        mock.set_register(REG_DATA_B, 0x00);
        leds.blink_on(LedColor::Red).unwrap();
        mock.clear_writes();

        leds.off(LedColor::Red).unwrap();

        assert_eq!(mock.writes(), vec![(REG_DATA_B, 0x40)]);
        assert_eq!(mock.register(0x5F), LED_BLINK_T_ON);
        assert_eq!(leds.mode(LedColor::Red).unwrap(), LedMode::Off);
    }

    #[test]
    fn colors_are_independent() {
        let (leds, mock) = controller();
        mock.set_register(REG_DATA_B, 0x15);

        leds.set(LedColor::Green, LedMode::Steady).unwrap();
        leds.set(LedColor::Red, LedMode::Blink).unwrap();
        leds.set(LedColor::Green, LedMode::Off).unwrap();

        assert_eq!(leds.mode(LedColor::Red).unwrap(), LedMode::Blink);
        assert_eq!(leds.mode(LedColor::Green).unwrap(), LedMode::Off);
        assert_eq!(mock.register(REG_DATA_B) & 0x3F, 0x15);
    }
}
