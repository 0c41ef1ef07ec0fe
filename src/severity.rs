use crate::clock::Millis;
use std::fmt;

/// CO2 concentration in parts per million, as reported by the sensor.
///
/// Signed on purpose: some NDIR sensors wrap to negative values when the
/// concentration exceeds their range.
pub type Ppm = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityLevel {
    Normal = 0,
    Elevated = 1,
    High = 2,
    Severe = 3,
    Critical = 4,
    Extreme = 5,
}

/// Inclusive lower bound of each band, highest first.
const BANDS: [(Ppm, SeverityLevel); 5] = [
    (30_000, SeverityLevel::Extreme),
    (10_000, SeverityLevel::Critical),
    (5_000, SeverityLevel::Severe),
    (2_500, SeverityLevel::High),
    (1_000, SeverityLevel::Elevated),
];

/// Inclusive lower bound of each buzzer pulse length, highest first.
const TONE_DURATIONS: [(Ppm, Millis); 3] = [(10_000, 500), (5_000, 1_000), (1_000, 2_000)];

/// Overrange readings come back as zero or negative.
fn is_overrange(ppm: Ppm) -> bool {
    ppm <= 0
}

pub fn classify(ppm: Ppm) -> SeverityLevel {
    if is_overrange(ppm) {
        return SeverityLevel::Extreme;
    }

    BANDS
        .iter()
        .find(|(lower, _)| ppm >= *lower)
        .map(|&(_, level)| level)
        .unwrap_or(SeverityLevel::Normal)
}

/// Length of one alarm pulse for a raw reading. `None` means stay silent.
pub fn tone_duration(ppm: Ppm) -> Option<Millis> {
    if is_overrange(ppm) {
        return Some(TONE_DURATIONS[0].1);
    }

    TONE_DURATIONS
        .iter()
        .find(|(lower, _)| ppm >= *lower)
        .map(|&(_, duration)| duration)
}

impl SeverityLevel {
    /// Cadence of the periodic re-tone while this level holds.
    ///
    /// Elevated and High only blink or glow; they never re-tone.
    pub fn retone_period(self) -> Option<Millis> {
        match self {
            SeverityLevel::Severe => Some(10_000),
            SeverityLevel::Critical => Some(5_000),
            SeverityLevel::Extreme => Some(1_000),
            SeverityLevel::Normal | SeverityLevel::Elevated | SeverityLevel::High => None,
        }
    }

    pub fn uploads_telemetry(self) -> bool {
        self >= SeverityLevel::High
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeverityLevel::Normal => "normal",
            SeverityLevel::Elevated => "elevated",
            SeverityLevel::High => "high",
            SeverityLevel::Severe => "severe",
            SeverityLevel::Critical => "critical",
            SeverityLevel::Extreme => "extreme",
        };
        f.write_str(name)
    }
}
