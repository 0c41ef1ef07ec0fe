mod buzzer;

pub use buzzer::GpioBuzzer;

use crate::clock::Millis;
use crate::indicator::IndicatorError;
use crate::severity::{classify, tone_duration, Ppm, SeverityLevel};
use tracing::{debug, info, warn};

/// Pitch of every alarm pulse. Only the duration varies.
pub const PULSE_PITCH_HZ: u32 = 1_000;

pub trait Buzzer {
    fn tone(&mut self, pitch_hz: u32, duration: Millis, now: Millis) -> Result<(), IndicatorError>;

    fn silence(&mut self) -> Result<(), IndicatorError>;

    /// Called every loop pass so a buzzer can end a timed tone without sleeping.
    fn service(&mut self, _now: Millis) -> Result<(), IndicatorError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u32);

/// The single scheduler entry. Its action is always one alarm pulse using
/// the latest reading at the time it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTimer {
    pub handle: TimerHandle,
    pub fire_at: Millis,
    pub period: Millis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<SeverityLevel>,
    pub to: SeverityLevel,
}

/// The most recent pulse and the reading it was sized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub ppm: Ppm,
    pub at: Millis,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlarmStats {
    pub pulses: u32,
    pub armed: u32,
    pub cancelled: u32,
}

pub struct AlarmStateMachine<B> {
    buzzer: B,
    // None until the first reading, so that reading always transitions.
    current: Option<SeverityLevel>,
    latest_ppm: Ppm,
    timer: Option<AlarmTimer>,
    next_handle: u32,
    stats: AlarmStats,
    last_pulse: Option<Pulse>,
}

impl<B: Buzzer> AlarmStateMachine<B> {
    pub fn new(buzzer: B) -> Self {
        AlarmStateMachine {
            buzzer,
            current: None,
            latest_ppm: 0,
            timer: None,
            next_handle: 0,
            stats: AlarmStats::default(),
            last_pulse: None,
        }
    }

    /// Feed one fresh reading. Returns the transition if the level changed.
    pub fn observe(&mut self, ppm: Ppm, now: Millis) -> Option<Transition> {
        self.latest_ppm = ppm;
        let level = classify(ppm);

        if level == SeverityLevel::Normal {
            if let Err(e) = self.buzzer.silence() {
                warn!(error = %e, "Failed to silence buzzer");
            }
        }

        if self.current == Some(level) {
            return None;
        }

        if let Some(timer) = self.timer.take() {
            self.stats.cancelled += 1;
            debug!(handle = timer.handle.0, "Cancelled re-tone timer");
        }

        self.pulse(ppm, now);

        if let Some(period) = level.retone_period() {
            self.arm(now, period);
        }

        let from = self.current.replace(level);
        info!(ppm, from = ?from, to = %level, "Severity changed");

        Some(Transition { from, to: level })
    }

    /// Fire the re-tone timer if it is due.
    pub fn tick(&mut self, now: Millis) {
        self.service_buzzer(now);

        let due = match self.timer.as_mut() {
            Some(timer) if now >= timer.fire_at => {
                timer.fire_at = now + timer.period;
                true
            }
            _ => false,
        };

        if due {
            self.pulse(self.latest_ppm, now);
        }
    }

    /// Lets a timed tone end on schedule. Safe to call as often as needed,
    /// including while the loop is blocked on the link.
    pub fn service_buzzer(&mut self, now: Millis) {
        if let Err(e) = self.buzzer.service(now) {
            warn!(error = %e, "Failed to service buzzer");
        }
    }

    pub fn current_level(&self) -> Option<SeverityLevel> {
        self.current
    }

    pub fn armed_timer(&self) -> Option<&AlarmTimer> {
        self.timer.as_ref()
    }

    pub fn stats(&self) -> AlarmStats {
        self.stats
    }

    pub fn last_pulse(&self) -> Option<Pulse> {
        self.last_pulse
    }

    #[cfg(test)]
    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }

    fn arm(&mut self, now: Millis, period: Millis) {
        debug_assert!(self.timer.is_none());

        self.next_handle += 1;
        let timer = AlarmTimer {
            handle: TimerHandle(self.next_handle),
            fire_at: now + period,
            period,
        };
        self.timer = Some(timer);
        self.stats.armed += 1;
        debug!(handle = timer.handle.0, period_ms = period, "Armed re-tone timer");
    }

    fn pulse(&mut self, ppm: Ppm, now: Millis) {
        self.stats.pulses += 1;
        self.last_pulse = Some(Pulse { ppm, at: now });

        let result = match tone_duration(ppm) {
            Some(duration) => self.buzzer.tone(PULSE_PITCH_HZ, duration, now),
            None => self.buzzer.silence(),
        };

        if let Err(e) = result {
            warn!(error = %e, ppm, "Failed to drive alarm pulse");
        }
    }
}
