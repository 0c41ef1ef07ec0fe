//! AT-command link to the WiFi co-processor.
//!
//! Everything here is synchronous and blocking: a command is written, then
//! the inbound stream is polled until a marker shows up or the timeout
//! passes. The control loop stalls for the duration.

mod command;
mod link;
mod serial;
mod telemetry;

pub use command::CommandEngine;
pub use link::bring_up;
pub use serial::{SerialLink, SerialPortLink};
pub use telemetry::{TelemetryUploader, UploadOutcome};

#[cfg(test)]
pub use telemetry::UPLOAD_INTERVAL_MS;

#[cfg(test)]
pub use serial::mock;
