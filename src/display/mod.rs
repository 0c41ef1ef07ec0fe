mod lcd;

pub use lcd::Lcd1602;

use crate::severity::Ppm;
use i2cdev::linux::LinuxI2CError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("i2c error: {0}")]
    I2c(#[from] LinuxI2CError),
    #[error("cursor ({col}, {row}) is off screen")]
    OffScreen { col: u8, row: u8 },
}

/// Cursor-addressed text sink.
pub trait Display {
    fn write_at(&mut self, col: u8, row: u8, text: &str) -> Result<(), DisplayError>;
}

pub const PPM_ROW: u8 = 0;
pub const ENVIRONMENT_ROW: u8 = 1;

// The trailing spaces blank out digits left over from a longer reading.
pub fn format_ppm(ppm: Ppm) -> String {
    format!("{}  ppm  ", ppm)
}

pub fn format_environment(temperature: f32, humidity: f32) -> String {
    format!("T = {:.2}°C H = {:.2}%", temperature, humidity)
}

#[cfg(test)]
pub mod mock {
    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingDisplay {
        pub writes: Vec<(u8, u8, String)>,
    }

    impl RecordingDisplay {
        pub fn last_on_row(&self, row: u8) -> Option<&str> {
            self.writes
                .iter()
                .rev()
                .find(|(_, r, _)| *r == row)
                .map(|(_, _, text)| text.as_str())
        }
    }

    impl Display for RecordingDisplay {
        fn write_at(&mut self, col: u8, row: u8, text: &str) -> Result<(), DisplayError> {
            self.writes.push((col, row, text.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ppm_line_keeps_its_padding() {
        assert_eq!(format_ppm(415), "415  ppm  ");
        assert_eq!(format_ppm(-12), "-12  ppm  ");
    }

    #[test]
    fn environment_line_layout() {
        assert_eq!(format_environment(23.4, 45.0), "T = 23.40°C H = 45.00%");
        assert_eq!(format_environment(-3.25, 99.9), "T = -3.25°C H = 99.90%");
    }
}
