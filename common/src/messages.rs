use serde::{Deserialize, Serialize};

use crate::types::{deserialize_fan_setting, ActuatorUpdate, ControlPatch, SensorReading};

/// Manual actuator overrides pushed from the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManualCommand {
    pub heater: Option<bool>,
    #[serde(deserialize_with = "deserialize_fan_setting")]
    pub fan: Option<u8>,
    pub humidifier: Option<bool>,
}

impl ManualCommand {
    pub fn update(&self) -> ActuatorUpdate {
        ActuatorUpdate {
            heater: self.heater,
            fan: self.fan,
            humidifier: self.humidifier,
        }
    }

    pub fn patch(&self) -> ControlPatch {
        ControlPatch::manual(self.update())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Command(ManualCommand),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage<'a> {
    Sensor(&'a SensorReading),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadingFields;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_dashboard_command() {
        let message: InboundMessage =
            serde_json::from_str(r#"{"type": "command", "heater": true, "fan": false}"#).unwrap();

        let InboundMessage::Command(command) = message;
        assert_eq!(
            command.update(),
            ActuatorUpdate {
                heater: Some(true),
                fan: Some(0),
                humidifier: None,
            }
        );
        assert_eq!(command.patch().manual_heater, Some(true));
    }

    #[test]
    fn rejects_non_command_messages() {
        assert!(serde_json::from_str::<InboundMessage>(r#"{"type": "sensor"}"#).is_err());
    }

    #[test]
    fn sensor_message_is_tagged_and_flat() {
        let reading = SensorReading {
            id: 3,
            timestamp: chrono::NaiveDate::from_ymd_opt(2026, 1, 5)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            fields: ReadingFields {
                humidity: Some(40.0),
                ..ReadingFields::default()
            },
        };

        let value = serde_json::to_value(OutboundMessage::Sensor(&reading)).unwrap();

        assert_eq!(value["type"], "sensor");
        assert_eq!(value["id"], 3);
        assert_eq!(value["timestamp"], "2026-01-05 08:00:00");
        assert_eq!(value["scd_hum"], 40.0);
    }
}
