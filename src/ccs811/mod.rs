use crate::severity::Ppm;
use i2cdev::core::*;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError, LinuxI2CMessage};
use std::fmt::Debug;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const HW_ID: u8 = 0x81;

const STATUS_ERROR: u8 = 1 << 0;
const STATUS_DATA_READY: u8 = 1 << 3;
const STATUS_APP_VALID: u8 = 1 << 4;

/// Drive mode 1: a new sample every second, no interrupt.
const MEAS_MODE_1S: u8 = 0x10;

#[derive(Debug, Clone, Copy)]
pub enum RegisterAddress {
    Status,
    MeasMode,
    AlgResultData,
    HwId,
    ErrorId,
    AppStart,
}

impl From<RegisterAddress> for u8 {
    fn from(address: RegisterAddress) -> u8 {
        match address {
            RegisterAddress::Status => 0x00,
            RegisterAddress::MeasMode => 0x01,
            RegisterAddress::AlgResultData => 0x02,
            RegisterAddress::HwId => 0x20,
            RegisterAddress::ErrorId => 0xE0,
            RegisterAddress::AppStart => 0xF4,
        }
    }
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("i2c error: {0}")]
    I2c(#[from] LinuxI2CError),
    #[error("unexpected hardware id {0:#04x}")]
    UnexpectedHardware(u8),
    #[error("no valid application firmware loaded")]
    NoApplication,
    #[error("sensor reported error {0:#04x}")]
    Device(u8),
}

/// CCS811 gas sensor, used here as the CO2 (eCO2) read source.
pub struct Ccs811Sensor {
    addr: u16,
    device: LinuxI2CDevice,
}

impl Debug for Ccs811Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("CCS811").field("addr", &self.addr).finish()
    }
}

impl Ccs811Sensor {
    pub fn init(bus: &str, addr: u16) -> Result<Self, SensorError> {
        let device = LinuxI2CDevice::new(bus, addr)?;
        let mut sensor = Ccs811Sensor { addr, device };

        let hw_id = sensor.read_byte(RegisterAddress::HwId)?;
        if hw_id != HW_ID {
            return Err(SensorError::UnexpectedHardware(hw_id));
        }

        if sensor.read_byte(RegisterAddress::Status)? & STATUS_APP_VALID == 0 {
            return Err(SensorError::NoApplication);
        }

        // APP_START is a bare register write with no payload.
        sensor.device.write(&[u8::from(RegisterAddress::AppStart)])?;
        thread::sleep(Duration::from_millis(1));

        sensor
            .device
            .write(&[u8::from(RegisterAddress::MeasMode), MEAS_MODE_1S])?;

        info!(addr = sensor.addr, "CCS811 measuring");
        Ok(sensor)
    }

    /// Returns a reading only when the sensor has a fresh one.
    pub fn poll_ppm(&mut self) -> Result<Option<Ppm>, SensorError> {
        let status = self.read_byte(RegisterAddress::Status)?;

        if status & STATUS_ERROR != 0 {
            let code = self.read_byte(RegisterAddress::ErrorId)?;
            return Err(SensorError::Device(code));
        }

        if status & STATUS_DATA_READY == 0 {
            return Ok(None);
        }

        let mut result = [0; 2];
        self.read(RegisterAddress::AlgResultData, &mut result)?;
        let ppm = Ppm::from(u16::from_be_bytes(result));

        debug!(ppm, "CO2 sample");
        Ok(Some(ppm))
    }

    fn read_byte(&mut self, address: RegisterAddress) -> Result<u8, SensorError> {
        let mut read_data = [0; 1];
        self.read(address, &mut read_data)?;
        Ok(read_data[0])
    }

    fn read(&mut self, address: RegisterAddress, buf: &mut [u8]) -> Result<(), SensorError> {
        let register = [u8::from(address)];
        let mut transaction = [
            LinuxI2CMessage::write(&register),
            LinuxI2CMessage::read(buf),
        ];

        self.device.transfer(&mut transaction)?;
        Ok(())
    }
}
