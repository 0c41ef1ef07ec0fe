use super::serial::SerialLink;
use crate::clock::{Clock, Millis};
use crate::util::contains_subsequence;
use tracing::{debug, warn};

const LINE_TERMINATOR: &[u8] = b"\r\n";
const POLL_INTERVAL_MS: Millis = 1;
const READ_CHUNK: usize = 256;

/// Outcome of one command. Produced per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: String,
    pub success: bool,
}

/// Blocking command/response primitive over the co-processor link.
///
/// Only one command is ever in flight: `send` returns only after the marker
/// is seen or the timeout has passed.
pub struct CommandEngine<S, C> {
    serial: S,
    clock: C,
    inbound: Vec<u8>,
}

impl<S: SerialLink, C: Clock> CommandEngine<S, C> {
    pub fn new(serial: S, clock: C) -> Self {
        CommandEngine {
            serial,
            clock,
            inbound: Vec::with_capacity(READ_CHUNK),
        }
    }

    pub fn send(&mut self, command: &str, timeout: Millis, expected: &str) -> CommandResult {
        self.send_with(command, timeout, expected, &mut |_| {})
    }

    /// Like `send`, but calls `background` on every poll while waiting so
    /// time-critical outputs can still be serviced during the stall.
    pub fn send_with(
        &mut self,
        command: &str,
        timeout: Millis,
        expected: &str,
        background: &mut dyn FnMut(Millis),
    ) -> CommandResult {
        let shown = loggable(command);
        let success = match self.write_line(command.as_bytes()) {
            Ok(()) => self.wait_for(expected.as_bytes(), timeout, background),
            Err(e) => {
                warn!(command = %shown, error = %e, "Failed to write command");
                false
            }
        };

        if success {
            debug!(command = %shown, expected, "Command acknowledged");
        } else {
            warn!(
                command = %shown,
                expected,
                timeout_ms = timeout,
                response = %String::from_utf8_lossy(&self.inbound).trim(),
                "Command failed"
            );
        }

        CommandResult {
            command: command.to_string(),
            success,
        }
    }

    /// Writes `payload` plus a line terminator without waiting for anything.
    pub fn write_line(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.inbound.clear();
        let mut line = Vec::with_capacity(payload.len() + LINE_TERMINATOR.len());
        line.extend_from_slice(payload);
        line.extend_from_slice(LINE_TERMINATOR);
        self.serial.write_all(&line)
    }

    /// Blocks for `duration`, calling `background` on every poll.
    pub fn pause(&mut self, duration: Millis, background: &mut dyn FnMut(Millis)) {
        let start = self.clock.now();
        loop {
            let now = self.clock.now();
            background(now);
            if now.saturating_sub(start) >= duration {
                return;
            }
            self.clock.delay(POLL_INTERVAL_MS);
        }
    }

    #[cfg(test)]
    pub fn serial(&self) -> &S {
        &self.serial
    }

    fn wait_for(
        &mut self,
        expected: &[u8],
        timeout: Millis,
        background: &mut dyn FnMut(Millis),
    ) -> bool {
        let start = self.clock.now();
        let mut buf = [0; READ_CHUNK];

        loop {
            match self.serial.read_available(&mut buf) {
                Ok(read) => self.inbound.extend_from_slice(&buf[..read]),
                Err(e) => {
                    warn!(error = %e, "Failed to read from co-processor");
                    return false;
                }
            }

            if contains_subsequence(&self.inbound, expected) {
                return true;
            }

            let now = self.clock.now();
            background(now);
            if now.saturating_sub(start) >= timeout {
                return false;
            }

            self.clock.delay(POLL_INTERVAL_MS);
        }
    }
}

/// Keeps network credentials out of the logs.
pub(super) fn loggable(command: &str) -> &str {
    match command.find("CWJAP=") {
        Some(at) => &command[..at + "CWJAP=".len()],
        None => command,
    }
}
