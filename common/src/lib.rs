pub mod config;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod overrides;
pub mod schedule;
pub mod telemetry;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use config::{
    ControlConfig, HttpConfig, PushConfig, RuntimeConfig, SerialConfig, StorageConfig,
    ThermostatConfig,
};
pub use dispatch::{ActuatorCommand, CommandTracker};
pub use error::ParseError;
pub use messages::{InboundMessage, ManualCommand, OutboundMessage};
pub use overrides::OverrideToken;
pub use schedule::{minute_of_day, Schedule, ScheduleEntry};
pub use telemetry::{parse_line, parse_reading, TelemetryFields, TelemetryValue};
pub use thermostat::{compute_levels, ThermostatEngine};
pub use topics::*;
pub use types::{
    ActuatorLevels, ActuatorUpdate, ControlPatch, ControlState, ReadingFields, SensorReading,
    ThermostatMode, ThermostatState, TIMESTAMP_FORMAT,
};
