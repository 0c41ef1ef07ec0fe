use super::Buzzer;
use crate::clock::Millis;
use crate::indicator::IndicatorError;
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use std::fmt::Debug;
use tracing::trace;

/// Active piezo buzzer on a single GPIO line.
///
/// An active buzzer has its own oscillator, so the requested pitch is only
/// logged. The tone ends on the first `service` call past its deadline.
pub struct GpioBuzzer {
    gpio_pin: u32,
    handle: LineHandle,
    off_at: Option<Millis>,
}

impl Debug for GpioBuzzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioBuzzer")
            .field("gpio_pin", &self.gpio_pin)
            .field("off_at", &self.off_at)
            .finish()
    }
}

impl GpioBuzzer {
    pub fn init(chip: &mut Chip, gpio_pin: u32) -> Result<Self, IndicatorError> {
        let handle = chip
            .get_line(gpio_pin)?
            .request(LineRequestFlags::OUTPUT, 0, "co2-buzzer")?;

        Ok(GpioBuzzer {
            gpio_pin,
            handle,
            off_at: None,
        })
    }
}

impl Buzzer for GpioBuzzer {
    fn tone(&mut self, pitch_hz: u32, duration: Millis, now: Millis) -> Result<(), IndicatorError> {
        trace!(pitch_hz, duration_ms = duration, "Buzzer on");
        self.handle.set_value(1)?;
        self.off_at = Some(now + duration);
        Ok(())
    }

    fn silence(&mut self) -> Result<(), IndicatorError> {
        self.off_at = None;
        self.handle.set_value(0)?;
        Ok(())
    }

    fn service(&mut self, now: Millis) -> Result<(), IndicatorError> {
        match self.off_at {
            Some(off_at) if now >= off_at => self.silence(),
            _ => Ok(()),
        }
    }
}
