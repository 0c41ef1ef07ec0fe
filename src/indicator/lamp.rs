use super::{IndicatorError, Lamp, Rgb};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use std::fmt::Debug;

/// Common-cathode RGB LED on three GPIO lines.
///
/// GPIO lines are digital, so any non-zero intensity turns its channel on.
pub struct GpioLamp {
    pins: [u32; 3],
    channels: [LineHandle; 3],
}

impl Debug for GpioLamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioLamp").field("pins", &self.pins).finish()
    }
}

impl GpioLamp {
    pub fn init(chip: &mut Chip, red: u32, green: u32, blue: u32) -> Result<Self, IndicatorError> {
        let mut request = |pin: u32| -> Result<LineHandle, gpio_cdev::Error> {
            chip.get_line(pin)?
                .request(LineRequestFlags::OUTPUT, 0, "co2-lamp")
        };

        let channels = [request(red)?, request(green)?, request(blue)?];

        Ok(GpioLamp {
            pins: [red, green, blue],
            channels,
        })
    }
}

impl Lamp for GpioLamp {
    fn set(&mut self, color: Rgb) -> Result<(), IndicatorError> {
        for (handle, intensity) in self.channels.iter().zip([color.r, color.g, color.b]) {
            handle.set_value(u8::from(intensity > 0))?;
        }
        Ok(())
    }
}
