//! Interrupt line implementation using the gpiod character-device library.
use crate::{GpioError, GpioResult, InterruptLine};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::path::Path;

/// A single GPIO line requested as an input with pull-up bias and falling-edge detection.
///
/// The expander pulls its open-drain interrupt output low when it has something to report, so
/// the line idles high and every report shows up as a falling edge.
pub struct GpiodInterruptLine {
    chip_name: String,
    pin_index: u32,
    line: gpiod::Lines<gpiod::Input>,
}

impl GpiodInterruptLine {
    /// Requests line `pin_index` of the GPIO chip at `chip` (like `/dev/gpiochip0`).
    pub fn open(chip: impl AsRef<Path>, pin_index: u32) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(chip.as_ref())?;
        if pin_index >= chip.num_lines() {
            return Err(GpioError::InvalidArgument);
        }

        let line = chip.request_lines(
            gpiod::Options::input([pin_index])
                .consumer(env!("CARGO_PKG_NAME"))
                .bias(gpiod::Bias::PullUp)
                .edge(gpiod::EdgeDetect::Falling),
        )?;

        Ok(Self {
            chip_name: chip.name().to_string(),
            pin_index,
            line,
        })
    }
}

impl Debug for GpiodInterruptLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodInterruptLine({})[{}]", self.chip_name, self.pin_index)
    }
}

impl InterruptLine for GpiodInterruptLine {
    fn wait_falling_edge(&mut self) -> GpioResult<()> {
        loop {
            let event = self.line.read_event()?;
            trace!("{:?}: {:?}", self, event);
            if event.edge == gpiod::Edge::Falling {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn open_missing_chip_fails() {
        let path = PathBuf::from("/nonexistent/gpiochip0");
        assert!(GpiodInterruptLine::open(&path, 4).is_err());
        assert!(GpiodInterruptLine::open("/nonexistent/gpiochip0", 4).is_err());
    }
}
