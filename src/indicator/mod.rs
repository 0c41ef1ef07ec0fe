mod lamp;

pub use lamp::GpioLamp;

use crate::clock::Millis;
use crate::severity::SeverityLevel;
use thiserror::Error;
use tracing::warn;

pub const BLINK_PERIOD_MS: Millis = 500;

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("gpio error: {0}")]
    Gpio(#[from] gpio_cdev::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const SAFE: Rgb = Rgb::new(0, 255, 0);
    pub const AMBER: Rgb = Rgb::new(255, 160, 0);
    pub const ORANGE: Rgb = Rgb::new(255, 80, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

/// Three intensity channels of the status lamp.
pub trait Lamp {
    fn set(&mut self, color: Rgb) -> Result<(), IndicatorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Solid(Rgb),
    Blink(Rgb),
}

pub fn pattern_for(level: SeverityLevel) -> Pattern {
    match level {
        SeverityLevel::Normal => Pattern::Solid(Rgb::SAFE),
        SeverityLevel::Elevated => Pattern::Blink(Rgb::AMBER),
        SeverityLevel::High => Pattern::Solid(Rgb::ORANGE),
        SeverityLevel::Severe => Pattern::Blink(Rgb::ORANGE),
        SeverityLevel::Critical => Pattern::Solid(Rgb::RED),
        SeverityLevel::Extreme => Pattern::Blink(Rgb::RED),
    }
}

/// Drives the lamp for the current severity.
///
/// Blinking is evaluated on every loop pass against the time of the last
/// toggle, so it keeps going while the severity holds.
pub struct Indicator<L> {
    lamp: L,
    pattern: Option<Pattern>,
    lit: bool,
    last_toggle: Millis,
    toggles: u32,
}

impl<L: Lamp> Indicator<L> {
    pub fn new(lamp: L) -> Self {
        Indicator {
            lamp,
            pattern: None,
            lit: false,
            last_toggle: 0,
            toggles: 0,
        }
    }

    pub fn show(&mut self, level: SeverityLevel, now: Millis) {
        let pattern = pattern_for(level);
        if self.pattern == Some(pattern) {
            return;
        }

        self.pattern = Some(pattern);
        self.lit = true;
        self.last_toggle = now;

        let color = match pattern {
            Pattern::Solid(color) | Pattern::Blink(color) => color,
        };
        self.apply(color);
    }

    pub fn tick(&mut self, now: Millis) {
        let color = match self.pattern {
            Some(Pattern::Blink(color)) => color,
            _ => return,
        };

        if now.saturating_sub(self.last_toggle) < BLINK_PERIOD_MS {
            return;
        }

        self.lit = !self.lit;
        self.last_toggle = now;
        self.toggles += 1;
        self.apply(if self.lit { color } else { Rgb::OFF });
    }

    pub fn pattern(&self) -> Option<Pattern> {
        self.pattern
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    #[cfg(test)]
    pub fn lamp(&self) -> &L {
        &self.lamp
    }

    fn apply(&mut self, color: Rgb) {
        if let Err(e) = self.lamp.set(color) {
            warn!(error = %e, ?color, "Failed to drive status lamp");
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingLamp {
        pub colors: Vec<Rgb>,
    }

    impl Lamp for RecordingLamp {
        fn set(&mut self, color: Rgb) -> Result<(), IndicatorError> {
            self.colors.push(color);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingLamp;
    use super::*;

    fn toggles_over_two_seconds(step: Millis) -> u32 {
        let mut indicator = Indicator::new(RecordingLamp::default());
        indicator.show(SeverityLevel::Elevated, 0);

        let mut now = 0;
        while now < 2_000 {
            now += step;
            indicator.tick(now);
        }
        indicator.toggles()
    }

    #[test]
    fn blink_rate_does_not_depend_on_call_rate() {
        assert_eq!(toggles_over_two_seconds(10), 4);
        assert_eq!(toggles_over_two_seconds(100), 4);
        assert_eq!(toggles_over_two_seconds(250), 4);
    }

    #[test]
    fn blink_alternates_between_color_and_off() {
        let mut indicator = Indicator::new(RecordingLamp::default());
        indicator.show(SeverityLevel::Extreme, 0);
        indicator.tick(500);
        indicator.tick(1_000);

        assert_eq!(indicator.lamp().colors, vec![Rgb::RED, Rgb::OFF, Rgb::RED]);
        assert!(indicator.is_lit());
    }

    #[test]
    fn late_tick_restarts_the_window_from_the_toggle() {
        let mut indicator = Indicator::new(RecordingLamp::default());
        indicator.show(SeverityLevel::Severe, 0);

        indicator.tick(700);
        indicator.tick(1_100);
        assert_eq!(indicator.toggles(), 1);

        indicator.tick(1_200);
        assert_eq!(indicator.toggles(), 2);
    }

    #[test]
    fn solid_levels_never_toggle() {
        let mut indicator = Indicator::new(RecordingLamp::default());
        indicator.show(SeverityLevel::Critical, 0);
        for now in (0..5_000).step_by(50) {
            indicator.tick(now);
        }

        assert_eq!(indicator.toggles(), 0);
        assert_eq!(indicator.lamp().colors, vec![Rgb::RED]);
    }

    #[test]
    fn reshowing_the_same_level_keeps_the_blink_phase() {
        let mut indicator = Indicator::new(RecordingLamp::default());
        indicator.show(SeverityLevel::Elevated, 0);
        indicator.tick(500);
        assert!(!indicator.is_lit());

        indicator.show(SeverityLevel::Elevated, 600);
        assert!(!indicator.is_lit());
        indicator.tick(1_000);

        assert!(indicator.is_lit());
        assert_eq!(indicator.lamp().colors, vec![Rgb::AMBER, Rgb::OFF, Rgb::AMBER]);
    }

    #[test]
    fn blink_colors_by_band() {
        assert_eq!(pattern_for(SeverityLevel::Normal), Pattern::Solid(Rgb::SAFE));
        assert_eq!(pattern_for(SeverityLevel::Elevated), Pattern::Blink(Rgb::AMBER));
        assert_eq!(pattern_for(SeverityLevel::High), Pattern::Solid(Rgb::ORANGE));
        assert_eq!(pattern_for(SeverityLevel::Extreme), Pattern::Blink(Rgb::RED));
    }
}
