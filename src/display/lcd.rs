use super::{Display, DisplayError};
use i2cdev::core::*;
use i2cdev::linux::LinuxI2CDevice;
use std::fmt::Debug;
use std::thread;
use std::time::Duration;

const COLUMNS: u8 = 16;
const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

// PCF8574 backpack wiring: P0 = RS, P2 = EN, P3 = backlight, P4..P7 = D4..D7.
const RS: u8 = 0b0000_0001;
const EN: u8 = 0b0000_0100;
const BACKLIGHT: u8 = 0b0000_1000;

const CLEAR_DISPLAY: u8 = 0x01;
const ENTRY_MODE_INCREMENT: u8 = 0x06;
const DISPLAY_ON: u8 = 0x0C;
const FUNCTION_SET_4BIT_2LINE: u8 = 0x28;
const SET_DDRAM_ADDR: u8 = 0x80;

/// HD44780 ROM A00 glyph for the degree sign.
const DEGREE_GLYPH: u8 = 0xDF;

/// 16x2 character LCD behind a PCF8574 I2C expander.
pub struct Lcd1602 {
    addr: u16,
    device: LinuxI2CDevice,
}

impl Debug for Lcd1602 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("LCD1602").field("addr", &self.addr).finish()
    }
}

impl Lcd1602 {
    pub fn init(bus: &str, addr: u16) -> Result<Self, DisplayError> {
        let device = LinuxI2CDevice::new(bus, addr)?;
        let mut lcd = Lcd1602 { addr, device };

        // Power-on reset into 8-bit mode three times, then switch to 4-bit.
        thread::sleep(Duration::from_millis(50));
        for wait_us in [4_500, 4_500, 150] {
            lcd.pulse(0x30)?;
            thread::sleep(Duration::from_micros(wait_us));
        }
        lcd.pulse(0x20)?;

        lcd.command(FUNCTION_SET_4BIT_2LINE)?;
        lcd.command(DISPLAY_ON)?;
        lcd.command(CLEAR_DISPLAY)?;
        thread::sleep(Duration::from_millis(2));
        lcd.command(ENTRY_MODE_INCREMENT)?;

        Ok(lcd)
    }

    fn command(&mut self, byte: u8) -> Result<(), DisplayError> {
        self.send(byte, 0)
    }

    fn send(&mut self, byte: u8, mode: u8) -> Result<(), DisplayError> {
        self.pulse((byte & 0xF0) | mode)?;
        self.pulse((byte << 4) | mode)
    }

    fn pulse(&mut self, nibble: u8) -> Result<(), DisplayError> {
        let bits = nibble | BACKLIGHT;
        self.device.write(&[bits | EN])?;
        thread::sleep(Duration::from_micros(1));
        self.device.write(&[bits])?;
        thread::sleep(Duration::from_micros(50));
        Ok(())
    }
}

fn to_glyph(c: char) -> u8 {
    match c {
        '°' => DEGREE_GLYPH,
        c if c.is_ascii() && !c.is_ascii_control() => c as u8,
        _ => b'?',
    }
}

impl Display for Lcd1602 {
    fn write_at(&mut self, col: u8, row: u8, text: &str) -> Result<(), DisplayError> {
        let offset = ROW_OFFSETS
            .get(row as usize)
            .filter(|_| col < COLUMNS)
            .ok_or(DisplayError::OffScreen { col, row })?;

        self.command(SET_DDRAM_ADDR | (offset + col))?;
        for glyph in text.chars().map(to_glyph) {
            self.send(glyph, RS)?;
        }
        Ok(())
    }
}
