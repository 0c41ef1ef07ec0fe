use crate::util::vec_to_int;
use futures::stream::StreamExt;
use gpio_cdev::{
    AsyncLineEventHandle, Chip, EventRequestFlags, EventType, Line, LineEvent, LineRequestFlags,
};
use itertools::Itertools;
use std::time;
use thiserror::Error;
use tracing::trace;

const FRAME_BITS: usize = 40;

// A "1" bit holds the line high for ~70us, a "0" for ~27us.
const ONE_BIT_THRESHOLD_NS: u64 = 40_000;

const NEGATIVE_TEMPERATURE: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentData {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
}

#[derive(Debug)]
pub struct EnvironmentSensor {
    gpio_pin: u32,
    line: Line,
}

#[derive(Debug, PartialEq, Error)]
pub enum ConversionError {
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("expected a 40-bit frame")]
    UnexpectedInput,
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor did not acknowledge the start signal")]
    InvalidAck,
    #[error("edge stream ended early")]
    BadRead,
    #[error("gpio error: {0}")]
    GpioError(#[from] gpio_cdev::Error),
    #[error("read timed out")]
    TimeoutError,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl EnvironmentSensor {
    pub fn init(chip_path: &str, gpio_pin: u32) -> Result<Self, SensorError> {
        let mut chip = Chip::new(chip_path)?;
        let line = chip.get_line(gpio_pin)?;

        Ok(EnvironmentSensor { gpio_pin, line })
    }

    pub async fn read_env_data(&self) -> Result<EnvironmentData, ReadError> {
        trace!(gpio_pin = self.gpio_pin, "Reading DHT22");
        let frame = tokio::time::timeout(time::Duration::from_millis(50), self.read())
            .await
            .map_err(|_| SensorError::TimeoutError)??;

        Ok(EnvironmentData::from_raw_output(&frame)?)
    }

    async fn read(&self) -> Result<Vec<u8>, SensorError> {
        Self::send_start_signal(&self.line).await?;

        let line_evt_handle = self.line.events(
            LineRequestFlags::INPUT,
            EventRequestFlags::BOTH_EDGES,
            "dht22-read",
        )?;
        let mut events = AsyncLineEventHandle::new(line_evt_handle)?;

        // The sensor acknowledges by pulling the line low. Anything else
        // means we joined mid-frame, so give up rather than drain it.
        let ack = events.next().await.ok_or(SensorError::BadRead)??;
        if ack.event_type() != EventType::FallingEdge {
            return Err(SensorError::InvalidAck);
        }

        let mut bits = Vec::with_capacity(FRAME_BITS);
        while bits.len() < FRAME_BITS {
            let rising = events.next().await.ok_or(SensorError::BadRead)??;
            let falling = events.next().await.ok_or(SensorError::BadRead)??;
            bits.push(Self::edges_to_bit(&rising, &falling));
        }

        Ok(bits)
    }

    async fn send_start_signal(line: &Line) -> Result<(), gpio_cdev::Error> {
        // Hold the line low for at least 1 ms. The handle is dropped on
        // return, releasing the line back to the pull-up.
        let handle = line.request(LineRequestFlags::OUTPUT, 1, "dht22-start")?;

        handle.set_value(0)?;
        tokio::time::sleep(time::Duration::from_millis(2)).await;
        Ok(())
    }

    fn edges_to_bit(rising: &LineEvent, falling: &LineEvent) -> u8 {
        match falling.timestamp().saturating_sub(rising.timestamp()) {
            x if x < ONE_BIT_THRESHOLD_NS => 0,
            _ => 1,
        }
    }
}

impl EnvironmentData {
    pub fn from_raw_output(output: &[u8]) -> Result<Self, ConversionError> {
        if output.len() != FRAME_BITS {
            return Err(ConversionError::UnexpectedInput);
        }

        let bytes: Vec<u8> = output.chunks(8).map(vec_to_int).collect();

        Self::validate(&bytes)?;

        let (humidity, temperature) = bytes[0..4]
            .iter()
            .tuples()
            .map(|(&high, &low)| u16::from_be_bytes([high, low]))
            .collect_tuple::<(u16, u16)>()
            .ok_or(ConversionError::UnexpectedInput)?;

        let magnitude = f32::from(temperature & !NEGATIVE_TEMPERATURE) / 10.0;
        let temperature = if temperature & NEGATIVE_TEMPERATURE != 0 {
            -magnitude
        } else {
            magnitude
        };

        Ok(EnvironmentData {
            temperature,
            humidity: f32::from(humidity) / 10.0,
        })
    }

    fn validate(converted: &[u8]) -> Result<(), ConversionError> {
        // The last byte is the truncated sum of the first four.
        let checksum = converted.last().ok_or(ConversionError::UnexpectedInput)?;
        let sum = converted[0..4]
            .iter()
            .fold(0_u8, |sum, &byte| sum.wrapping_add(byte));

        if *checksum != sum {
            return Err(ConversionError::BadChecksum);
        }

        Ok(())
    }
}
