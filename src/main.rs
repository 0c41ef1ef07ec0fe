mod alarm;
mod ccs811;
mod clock;
mod config;
mod display;
mod indicator;
mod monitor;
mod severity;
mod temperature_humidity;
mod util;
mod wifi;

use alarm::{GpioBuzzer, Transition};
use anyhow::Context;
use ccs811::Ccs811Sensor;
use clock::{Clock, MonotonicClock};
use config::AppConfig;
use display::Lcd1602;
use envconfig::Envconfig;
use gpio_cdev::Chip;
use indicator::GpioLamp;
use monitor::Monitor;
use std::time::Duration;
use temperature_humidity::EnvironmentSensor;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wifi::{CommandEngine, SerialPortLink, TelemetryUploader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::init_from_env().context("Failed to read configuration")?;
    let clock = MonotonicClock::new();

    let mut chip = Chip::new(&config.gpio_chip)
        .with_context(|| format!("Failed to open {}", config.gpio_chip))?;
    let lamp = GpioLamp::init(
        &mut chip,
        config.led_red_pin,
        config.led_green_pin,
        config.led_blue_pin,
    )
    .context("Failed to claim lamp lines")?;
    let buzzer =
        GpioBuzzer::init(&mut chip, config.buzzer_pin).context("Failed to claim buzzer line")?;
    let display = Lcd1602::init(&config.i2c_bus, config.lcd_i2c_addr)
        .context("Failed to initialize LCD")?;
    let mut co2_sensor = Ccs811Sensor::init(&config.i2c_bus, config.ccs811_i2c_addr)
        .context("Failed to initialize CCS811")?;
    let environment_sensor = EnvironmentSensor::init(&config.gpio_chip, config.dht22_pin)
        .context("Failed to claim DHT22 line")?;
    let serial = SerialPortLink::open(&config.wifi_serial_port, config.wifi_baud_rate)
        .with_context(|| format!("Failed to open {}", config.wifi_serial_port))?;

    let uploader = TelemetryUploader::new(
        config.telemetry_host.as_str(),
        config.telemetry_port,
        config.telemetry_api_key.as_str(),
    );
    let mut monitor = Monitor::new(
        lamp,
        buzzer,
        display,
        CommandEngine::new(serial, clock),
        uploader,
    );

    if config.wifi_ssid.is_empty() {
        warn!("WIFI_SSID not set, running without telemetry");
    } else {
        monitor.bring_up_link(&config.wifi_ssid, &config.wifi_password);
    }

    info!(poll_period_ms = config.poll_period_ms, "Monitoring CO2");

    let mut poll = tokio::time::interval(Duration::from_millis(config.poll_period_ms));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        poll.tick().await;
        monitor.tick(clock.now());

        match co2_sensor.poll_ppm() {
            Ok(Some(ppm)) => {
                if let Some(Transition { from: Some(from), to }) =
                    monitor.on_reading(ppm, clock.now())
                {
                    if to < from {
                        info!(%from, %to, "CO2 easing");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read CO2 sensor"),
        }

        if monitor.environment_due(clock.now()) {
            match environment_sensor.read_env_data().await {
                Ok(sample) => monitor.record_environment(sample),
                Err(e) => warn!(error = %e, "Failed to read environment probe"),
            }
        }
    }
}
