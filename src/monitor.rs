use crate::alarm::{AlarmStateMachine, Buzzer, Transition};
use crate::clock::{Clock, Millis};
use crate::display::{format_environment, format_ppm, Display, ENVIRONMENT_ROW, PPM_ROW};
use crate::indicator::{Indicator, Lamp};
use crate::severity::{classify, Ppm};
use crate::temperature_humidity::EnvironmentData;
use crate::wifi::{bring_up, CommandEngine, SerialLink, TelemetryUploader, UploadOutcome};
use tracing::{info, warn};

pub const ENVIRONMENT_INTERVAL_MS: Millis = 3_000;
const HEARTBEAT_INTERVAL_MS: Millis = 60_000;

/// All mutable state of the control loop.
///
/// The loop hands every CO2 reading to `on_reading` and calls `tick` once
/// per pass; everything time-driven happens from those two calls.
pub struct Monitor<L, B, D, S, C> {
    alarm: AlarmStateMachine<B>,
    indicator: Indicator<L>,
    display: D,
    engine: CommandEngine<S, C>,
    uploader: TelemetryUploader,
    environment: EnvironmentData,
    last_environment_sample: Option<Millis>,
    last_heartbeat: Millis,
}

impl<L, B, D, S, C> Monitor<L, B, D, S, C>
where
    L: Lamp,
    B: Buzzer,
    D: Display,
    S: SerialLink,
    C: Clock,
{
    pub fn new(
        lamp: L,
        buzzer: B,
        display: D,
        engine: CommandEngine<S, C>,
        uploader: TelemetryUploader,
    ) -> Self {
        Monitor {
            alarm: AlarmStateMachine::new(buzzer),
            indicator: Indicator::new(lamp),
            display,
            engine,
            uploader,
            environment: EnvironmentData::default(),
            last_environment_sample: None,
            last_heartbeat: 0,
        }
    }

    pub fn bring_up_link(&mut self, ssid: &str, password: &str) -> bool {
        bring_up(&mut self.engine, ssid, password)
    }

    pub fn on_reading(&mut self, ppm: Ppm, now: Millis) -> Option<Transition> {
        self.write(0, PPM_ROW, &format_ppm(ppm));

        let level = classify(ppm);
        let transition = self.alarm.observe(ppm, now);
        self.indicator.show(level, now);

        if level.uploads_telemetry() && self.uploader.begin_attempt(now) {
            let EnvironmentData {
                temperature,
                humidity,
            } = self.environment;
            // The link blocks the loop; keep ending tones on time meanwhile.
            let alarm = &mut self.alarm;
            let outcome = self.uploader.upload(
                &mut self.engine,
                temperature,
                humidity,
                ppm,
                &mut |now| alarm.service_buzzer(now),
            );
            if outcome != UploadOutcome::Completed {
                warn!(?outcome, last_success = ?self.uploader.last_success(), "Telemetry upload incomplete");
            }
        }

        transition
    }

    pub fn tick(&mut self, now: Millis) {
        self.alarm.tick(now);
        self.indicator.tick(now);

        if now.saturating_sub(self.last_heartbeat) >= HEARTBEAT_INTERVAL_MS {
            self.last_heartbeat = now;
            self.heartbeat();
        }
    }

    /// Claims the environment sampling slot. Stamped on claim, so a failed
    /// probe read waits for the next slot.
    pub fn environment_due(&mut self, now: Millis) -> bool {
        match self.last_environment_sample {
            Some(last) if now.saturating_sub(last) < ENVIRONMENT_INTERVAL_MS => false,
            _ => {
                self.last_environment_sample = Some(now);
                true
            }
        }
    }

    pub fn record_environment(&mut self, sample: EnvironmentData) {
        self.environment = sample;
        self.write(
            0,
            ENVIRONMENT_ROW,
            &format_environment(sample.temperature, sample.humidity),
        );
    }

    fn heartbeat(&self) {
        let stats = self.alarm.stats();
        info!(
            level = ?self.alarm.current_level(),
            pattern = ?self.indicator.pattern(),
            lamp_lit = self.indicator.is_lit(),
            toggles = self.indicator.toggles(),
            next_retone_at = ?self.alarm.armed_timer().map(|timer| timer.fire_at),
            last_pulse_ppm = ?self.alarm.last_pulse().map(|pulse| pulse.ppm),
            pulses = stats.pulses,
            timers_armed = stats.armed,
            timers_cancelled = stats.cancelled,
            temperature = self.environment.temperature,
            humidity = self.environment.humidity,
            "Heartbeat"
        );
    }

    fn write(&mut self, col: u8, row: u8, text: &str) {
        if let Err(e) = self.display.write_at(col, row, text) {
            warn!(error = %e, row, "Display write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::mock::RecordingBuzzer;
    use crate::alarm::AlarmStats;
    use crate::clock::ManualClock;
    use crate::display::mock::RecordingDisplay;
    use crate::indicator::mock::RecordingLamp;
    use crate::indicator::{Pattern, Rgb};
    use crate::severity::SeverityLevel;
    use crate::wifi::mock::ScriptedSerial;
    use crate::wifi::UPLOAD_INTERVAL_MS;

    type TestMonitor =
        Monitor<RecordingLamp, RecordingBuzzer, RecordingDisplay, ScriptedSerial, ManualClock>;

    fn monitor(serial: ScriptedSerial, clock: &ManualClock) -> TestMonitor {
        Monitor::new(
            RecordingLamp::default(),
            RecordingBuzzer::default(),
            RecordingDisplay::default(),
            CommandEngine::new(serial, clock.clone()),
            TelemetryUploader::new("api.thingspeak.com", 80, "KEY"),
        )
    }

    fn uploads(monitor: &TestMonitor) -> usize {
        monitor.engine.serial().count_written("AT+CIPSTART")
    }

    #[test]
    fn reading_sequence_end_to_end() {
        let clock = ManualClock::new();
        let mut monitor = monitor(ScriptedSerial::cooperative(clock.clone()), &clock);

        monitor.on_reading(500, clock.now());
        assert_eq!(monitor.indicator.pattern(), Some(Pattern::Solid(Rgb::SAFE)));
        assert!(monitor.alarm.armed_timer().is_none());

        clock.advance(1_000);
        monitor.on_reading(1_500, clock.now());
        assert_eq!(monitor.indicator.pattern(), Some(Pattern::Blink(Rgb::AMBER)));
        assert!(monitor.indicator.is_lit());
        let after_first_elevated = monitor.alarm.stats();

        clock.advance(600);
        monitor.tick(clock.now());
        let toggles = monitor.indicator.toggles();
        assert_eq!(toggles, 1);

        clock.advance(400);
        assert_eq!(monitor.on_reading(1_500, clock.now()), None);
        assert_eq!(monitor.alarm.stats(), after_first_elevated);
        assert_eq!(monitor.indicator.toggles(), toggles);

        clock.advance(1_000);
        let transition = monitor.on_reading(6_000, clock.now());
        assert_eq!(transition.map(|t| t.to), Some(SeverityLevel::Severe));
        assert_eq!(monitor.indicator.pattern(), Some(Pattern::Blink(Rgb::ORANGE)));
        assert_eq!(monitor.alarm.armed_timer().map(|t| t.period), Some(10_000));

        clock.advance(1_000);
        monitor.on_reading(500, clock.now());
        assert_eq!(monitor.indicator.pattern(), Some(Pattern::Solid(Rgb::SAFE)));
        assert!(monitor.alarm.armed_timer().is_none());

        assert_eq!(
            monitor.alarm.stats(),
            AlarmStats {
                pulses: 4,
                armed: 1,
                cancelled: 1
            }
        );
        assert_eq!(uploads(&monitor), 1);
        assert_eq!(monitor.display.last_on_row(PPM_ROW), Some("500  ppm  "));
    }

    #[test]
    fn eligible_readings_inside_the_interval_upload_once() {
        let clock = ManualClock::new();
        let mut monitor = monitor(ScriptedSerial::cooperative(clock.clone()), &clock);

        monitor.on_reading(3_000, 0);
        monitor.on_reading(3_100, 10_000);

        assert_eq!(uploads(&monitor), 1);
    }

    #[test]
    fn failed_upload_does_not_delay_the_next_attempt() {
        let clock = ManualClock::new();
        let mut monitor = monitor(ScriptedSerial::new(clock.clone()), &clock);

        monitor.on_reading(12_000, 0);
        monitor.on_reading(12_000, UPLOAD_INTERVAL_MS);

        assert_eq!(uploads(&monitor), 2);
        assert!(monitor.uploader.last_success().is_none());
    }

    #[test]
    fn elevated_readings_never_upload() {
        let clock = ManualClock::new();
        let mut monitor = monitor(ScriptedSerial::cooperative(clock.clone()), &clock);

        monitor.on_reading(2_000, 0);
        monitor.on_reading(2_400, 20_000);

        assert_eq!(uploads(&monitor), 0);
    }

    #[test]
    fn alarms_keep_working_without_a_link() {
        let clock = ManualClock::new();
        let mut monitor = monitor(ScriptedSerial::new(clock.clone()), &clock);

        assert!(!monitor.bring_up_link("lab", "s3cret"));
        let start = clock.now();

        monitor.on_reading(35_000, start);
        let after_upload = clock.now();
        for now in (after_upload..=after_upload + 2_000).step_by(20) {
            monitor.tick(now);
        }

        assert!(monitor.alarm.stats().pulses >= 3);
        assert!(monitor.indicator.toggles() >= 4);
        assert_eq!(monitor.alarm.current_level(), Some(SeverityLevel::Extreme));
    }

    #[test]
    fn tone_ends_on_time_while_an_upload_blocks_the_loop() {
        let clock = ManualClock::new();
        let mut monitor = monitor(ScriptedSerial::new(clock.clone()), &clock);

        monitor.on_reading(12_000, 0);

        // The dead link held the loop for the whole open timeout.
        assert!(clock.now() >= 5_000);
        assert_eq!(monitor.alarm.buzzer().tones(), vec![(500, 0)]);
        assert_eq!(monitor.alarm.buzzer().ended(), vec![500]);
    }

    #[test]
    fn environment_sampling_is_gated_and_displayed() {
        let clock = ManualClock::new();
        let mut monitor = monitor(ScriptedSerial::cooperative(clock.clone()), &clock);

        assert!(monitor.environment_due(0));
        monitor.record_environment(EnvironmentData {
            temperature: 22.5,
            humidity: 41.0,
        });
        assert!(!monitor.environment_due(2_999));
        assert!(monitor.environment_due(3_000));

        assert_eq!(
            monitor.display.last_on_row(ENVIRONMENT_ROW),
            Some("T = 22.50°C H = 41.00%")
        );

        monitor.on_reading(4_000, 3_000);
        assert!(monitor
            .engine
            .serial()
            .written_text()
            .contains("field1=22.50&field2=41.00&field3=4000"));
    }
}
