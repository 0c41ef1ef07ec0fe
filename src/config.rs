use envconfig::Envconfig;

/** Immutable config needed for app startup */
#[derive(Envconfig, Debug)]
pub struct AppConfig {
    #[envconfig(from = "GPIO_CHIP", default = "/dev/gpiochip0")]
    pub gpio_chip: String,
    #[envconfig(from = "I2C_BUS", default = "/dev/i2c-1")]
    pub i2c_bus: String,
    #[envconfig(from = "DHT22_PIN", default = "13")]
    pub dht22_pin: u32,
    #[envconfig(from = "CCS811_I2C_ADDR", default = "90" /* 0x5A = 90 */)]
    pub ccs811_i2c_addr: u16,
    #[envconfig(from = "LCD_I2C_ADDR", default = "39" /* 0x27 = 39 */)]
    pub lcd_i2c_addr: u16,
    #[envconfig(from = "LED_RED_PIN", default = "17")]
    pub led_red_pin: u32,
    #[envconfig(from = "LED_GREEN_PIN", default = "27")]
    pub led_green_pin: u32,
    #[envconfig(from = "LED_BLUE_PIN", default = "22")]
    pub led_blue_pin: u32,
    #[envconfig(from = "BUZZER_PIN", default = "18")]
    pub buzzer_pin: u32,
    #[envconfig(from = "WIFI_SERIAL_PORT", default = "/dev/ttyS0")]
    pub wifi_serial_port: String,
    #[envconfig(from = "WIFI_BAUD_RATE", default = "115200")]
    pub wifi_baud_rate: u32,
    #[envconfig(from = "WIFI_SSID", default = "")]
    pub wifi_ssid: String,
    #[envconfig(from = "WIFI_PASSWORD", default = "")]
    pub wifi_password: String,
    #[envconfig(from = "TELEMETRY_HOST", default = "api.thingspeak.com")]
    pub telemetry_host: String,
    #[envconfig(from = "TELEMETRY_PORT", default = "80")]
    pub telemetry_port: u16,
    #[envconfig(from = "TELEMETRY_API_KEY", default = "")]
    pub telemetry_api_key: String,
    #[envconfig(from = "POLL_PERIOD_MS", default = "20")]
    pub poll_period_ms: u64,
}
