use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub heater_hysteresis: f64,
    pub fan_start_offset: f64,
    pub fan_gain: f64,
    pub humidity_low: f64,
    pub humidity_high: f64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            heater_hysteresis: 0.3,
            fan_start_offset: 1.0,
            fan_gain: 50.0,
            humidity_low: 15.0,
            humidity_high: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub settle_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 2_000,
            settle_ms: 2_000,
            retry_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub url: String,
    pub request_timeout_ms: u64,
    pub decision_interval_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/api/control".to_string(),
            request_timeout_ms: 1_000,
            decision_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/sensor_data.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub enabled: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
    pub max_payload_bytes: usize,
    pub retry_delay_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "climate-controller".to_string(),
            max_payload_bytes: 512,
            retry_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub serial: SerialConfig,
    pub control: ControlConfig,
    pub thermostat: ThermostatConfig,
    pub storage: StorageConfig,
    pub push: PushConfig,
    pub http: HttpConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.serial.read_timeout_ms = self.serial.read_timeout_ms.clamp(100, 10_000);
        self.serial.retry_delay_ms = self.serial.retry_delay_ms.clamp(100, 30_000);
        if self.serial.baud_rate == 0 {
            self.serial.baud_rate = SerialConfig::default().baud_rate;
        }

        self.control.request_timeout_ms = self.control.request_timeout_ms.clamp(100, 5_000);
        self.control.decision_interval_ms = self.control.decision_interval_ms.max(100);
        self.push.retry_delay_ms = self.push.retry_delay_ms.clamp(100, 30_000);

        self.thermostat.sanitize();
    }
}

impl ThermostatConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.heater_hysteresis.is_finite() || self.heater_hysteresis < 0.0 {
            self.heater_hysteresis = defaults.heater_hysteresis;
        }
        if !self.fan_start_offset.is_finite() || self.fan_start_offset < 0.0 {
            self.fan_start_offset = defaults.fan_start_offset;
        }
        if !self.fan_gain.is_finite() || self.fan_gain <= 0.0 {
            self.fan_gain = defaults.fan_gain;
        }
        if !self.humidity_low.is_finite() || !self.humidity_high.is_finite() {
            self.humidity_low = defaults.humidity_low;
            self.humidity_high = defaults.humidity_high;
        }
        if self.humidity_low > self.humidity_high {
            std::mem::swap(&mut self.humidity_low, &mut self.humidity_high);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"serial": {"port": "/dev/ttyUSB1"}}"#).unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.control, ControlConfig::default());
        assert!(!config.push.enabled);
    }

    #[test]
    fn sanitize_orders_humidity_band_and_clamps_timeouts() {
        let mut config = RuntimeConfig::default();
        config.thermostat.humidity_low = 40.0;
        config.thermostat.humidity_high = 30.0;
        config.thermostat.heater_hysteresis = -1.0;
        config.control.request_timeout_ms = 60_000;

        config.sanitize();

        assert_eq!(config.thermostat.humidity_low, 30.0);
        assert_eq!(config.thermostat.humidity_high, 40.0);
        assert_eq!(config.thermostat.heater_hysteresis, 0.3);
        assert_eq!(config.control.request_timeout_ms, 5_000);
    }
}
