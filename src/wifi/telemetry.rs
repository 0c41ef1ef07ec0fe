use super::command::CommandEngine;
use super::serial::SerialLink;
use crate::clock::{Clock, Millis};
use crate::severity::Ppm;
use chrono::{DateTime, Local};
use tracing::{info, warn};

/// Minimum spacing between upload attempts, successful or not.
pub const UPLOAD_INTERVAL_MS: Millis = 15_000;

const OPEN_TIMEOUT_MS: Millis = 5_000;
const ANNOUNCE_TIMEOUT_MS: Millis = 2_000;
const CLOSE_TIMEOUT_MS: Millis = 2_000;
const SETTLE_MS: Millis = 1_000;

const READY_MARKER: &str = ">";

pub fn format_request(api_key: &str, temperature: f32, humidity: f32, ppm: Ppm) -> String {
    format!(
        "GET /update?api_key={}&field1={:.2}&field2={:.2}&field3={}\r\n",
        api_key, temperature, humidity, ppm
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed,
    OpenFailed,
    AnnounceFailed,
    CloseFailed,
}

#[derive(Debug, Default)]
struct UploadState {
    last_attempt: Option<Millis>,
    last_success: Option<DateTime<Local>>,
}

/// Pushes readings to the telemetry endpoint through the co-processor's
/// TCP commands.
#[derive(Debug)]
pub struct TelemetryUploader {
    host: String,
    port: u16,
    api_key: String,
    state: UploadState,
}

impl TelemetryUploader {
    pub fn new(host: impl Into<String>, port: u16, api_key: impl Into<String>) -> Self {
        TelemetryUploader {
            host: host.into(),
            port,
            api_key: api_key.into(),
            state: UploadState::default(),
        }
    }

    /// Claims the upload slot if the interval has passed since the last
    /// attempt. Claiming stamps the attempt, so a failure still waits out
    /// the full interval.
    pub fn begin_attempt(&mut self, now: Millis) -> bool {
        match self.state.last_attempt {
            Some(last) if now.saturating_sub(last) < UPLOAD_INTERVAL_MS => false,
            _ => {
                self.state.last_attempt = Some(now);
                true
            }
        }
    }

    pub fn last_success(&self) -> Option<DateTime<Local>> {
        self.state.last_success
    }

    pub fn upload<S: SerialLink, C: Clock>(
        &mut self,
        engine: &mut CommandEngine<S, C>,
        temperature: f32,
        humidity: f32,
        ppm: Ppm,
        background: &mut dyn FnMut(Millis),
    ) -> UploadOutcome {
        let request = format_request(&self.api_key, temperature, humidity, ppm);

        let open = format!("AT+CIPSTART=\"TCP\",\"{}\",{}", self.host, self.port);
        if !engine
            .send_with(&open, OPEN_TIMEOUT_MS, "OK", background)
            .success {
            warn!(host = %self.host, "Could not open telemetry connection");
            return UploadOutcome::OpenFailed;
        }

        // The payload goes out as a line, so its terminator counts too.
        let announce = format!("AT+CIPSEND={}", request.len() + 2);
        if !engine
            .send_with(&announce, ANNOUNCE_TIMEOUT_MS, READY_MARKER, background)
            .success {
            warn!("Co-processor never became ready for the payload");
            self.close(engine, background);
            return UploadOutcome::AnnounceFailed;
        }

        if let Err(e) = engine.write_line(request.as_bytes()) {
            warn!(error = %e, "Failed to write telemetry payload");
        }
        engine.pause(SETTLE_MS, background);

        if !self.close(engine, background) {
            return UploadOutcome::CloseFailed;
        }

        let now = Local::now();
        info!(ppm, temperature, humidity, at = %now.format("%H:%M:%S"), "Telemetry uploaded");
        self.state.last_success = Some(now);
        UploadOutcome::Completed
    }

    fn close<S: SerialLink, C: Clock>(
        &self,
        engine: &mut CommandEngine<S, C>,
        background: &mut dyn FnMut(Millis),
    ) -> bool {
        engine
            .send_with("AT+CIPCLOSE", CLOSE_TIMEOUT_MS, "OK", background)
            .success
    }
}
