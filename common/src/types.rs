use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::schedule::Schedule;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThermostatMode {
    #[default]
    Off,
    Heat,
}

impl ThermostatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThermostatState {
    Idle,
    Heating,
    Cooling,
    Satisfied,
}

impl ThermostatState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
            Self::Satisfied => "SATISFIED",
        }
    }
}

/// Recognized telemetry fields of a single device line, before the store has
/// assigned an id and timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingFields {
    #[serde(rename = "bme_temp")]
    pub temperature: Option<f64>,
    #[serde(rename = "bme_press")]
    pub pressure: Option<f64>,
    #[serde(rename = "bme_gas")]
    pub gas: Option<f64>,
    #[serde(rename = "scd_co2")]
    pub co2: Option<i64>,
    #[serde(rename = "scd_hum")]
    pub humidity: Option<f64>,
}

impl ReadingFields {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.pressure.is_none()
            && self.gas.is_none()
            && self.co2.is_none()
            && self.humidity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub id: i64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub fields: ReadingFields,
}

fn serialize_timestamp<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorLevels {
    pub heater: bool,
    pub fan: u8,
    pub humidifier: bool,
}

impl ActuatorLevels {
    pub const OFF: Self = Self {
        heater: false,
        fan: 0,
        humidifier: false,
    };
}

/// A partial set of actuator levels. `None` leaves that actuator untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorUpdate {
    pub heater: Option<bool>,
    pub fan: Option<u8>,
    pub humidifier: Option<bool>,
}

impl ActuatorUpdate {
    pub fn is_empty(&self) -> bool {
        self.heater.is_none() && self.fan.is_none() && self.humidifier.is_none()
    }
}

impl From<ActuatorLevels> for ActuatorUpdate {
    fn from(levels: ActuatorLevels) -> Self {
        Self {
            heater: Some(levels.heater),
            fan: Some(levels.fan),
            humidifier: Some(levels.humidifier),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlState {
    pub mode: ThermostatMode,
    pub setpoint: f64,
    pub override_mode: bool,
    pub override_setpoint: Option<f64>,
    pub manual_heater: Option<bool>,
    #[serde(deserialize_with = "deserialize_fan_setting")]
    pub manual_fan: Option<u8>,
    pub manual_humidifier: Option<bool>,
    pub use_schedule: bool,
    pub schedule: Schedule,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            mode: ThermostatMode::Off,
            setpoint: 22.0,
            override_mode: false,
            override_setpoint: None,
            manual_heater: None,
            manual_fan: None,
            manual_humidifier: None,
            use_schedule: false,
            schedule: Schedule::default(),
        }
    }
}

impl ControlState {
    pub fn effective_setpoint(&self) -> f64 {
        match self.override_setpoint {
            Some(setpoint) if self.override_mode => setpoint,
            _ => self.setpoint,
        }
    }

    pub fn manual_overrides(&self) -> ActuatorUpdate {
        ActuatorUpdate {
            heater: self.manual_heater,
            fan: self.manual_fan,
            humidifier: self.manual_humidifier,
        }
    }
}

/// Partial update for the control store. Only populated fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_setpoint: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_heater: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_fan: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_humidifier: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heater: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidifier: Option<bool>,
}

impl ControlPatch {
    /// Mirror of the levels actually applied, for external observers.
    pub fn applied(levels: ActuatorLevels) -> Self {
        Self {
            heater: Some(levels.heater),
            fan: Some(levels.fan),
            humidifier: Some(levels.humidifier),
            ..Self::default()
        }
    }

    pub fn manual(update: ActuatorUpdate) -> Self {
        Self {
            manual_heater: update.heater,
            manual_fan: update.fan,
            manual_humidifier: update.humidifier,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FanSetting {
    Switch(bool),
    Level(f64),
}

/// Fan levels arrive either as a PWM number or, from older dashboards, as a
/// plain on/off switch.
pub(crate) fn deserialize_fan_setting<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let setting = Option::<FanSetting>::deserialize(deserializer)?;
    Ok(setting.map(|setting| match setting {
        FanSetting::Switch(true) => u8::MAX,
        FanSetting::Switch(false) => 0,
        FanSetting::Level(level) if level.is_finite() => level.round().clamp(0.0, 255.0) as u8,
        FanSetting::Level(_) => 0,
    }))
}
