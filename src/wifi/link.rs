use super::command::{loggable, CommandEngine};
use super::serial::SerialLink;
use crate::clock::{Clock, Millis};
use tracing::{info, warn};

const LIVENESS_TIMEOUT_MS: Millis = 2_000;
const MODE_TIMEOUT_MS: Millis = 2_000;
// Association with the access point routinely takes several seconds.
const JOIN_TIMEOUT_MS: Millis = 10_000;

/// Station mode.
const WIFI_MODE_STATION: u8 = 1;

/// Brings the co-processor onto the network.
///
/// All three commands are issued even if an earlier one fails; nothing is
/// retried. Returns whether every step was acknowledged.
pub fn bring_up<S: SerialLink, C: Clock>(
    engine: &mut CommandEngine<S, C>,
    ssid: &str,
    password: &str,
) -> bool {
    let steps = [
        ("AT".to_string(), LIVENESS_TIMEOUT_MS),
        (format!("AT+CWMODE={}", WIFI_MODE_STATION), MODE_TIMEOUT_MS),
        (
            format!("AT+CWJAP=\"{}\",\"{}\"", ssid, password),
            JOIN_TIMEOUT_MS,
        ),
    ];

    let results: Vec<_> = steps
        .iter()
        .map(|(command, timeout)| engine.send(command, *timeout, "OK"))
        .collect();

    let failed: Vec<&str> = results
        .iter()
        .filter(|result| !result.success)
        .map(|result| loggable(&result.command))
        .collect();

    if failed.is_empty() {
        info!(ssid, "WiFi link up");
        true
    } else {
        warn!(ssid, ?failed, "WiFi bring-up incomplete, telemetry may be unavailable");
        false
    }
}
