use serde::Serialize;

use crate::types::{ActuatorLevels, ActuatorUpdate};

/// Device command symbols. This table is shared with the device firmware.
pub const SYMBOL_HEATER_ON: u8 = b'H';
pub const SYMBOL_HEATER_OFF: u8 = b'h';
pub const SYMBOL_HUMIDIFIER_ON: u8 = b'U';
pub const SYMBOL_HUMIDIFIER_OFF: u8 = b'u';
pub const SYMBOL_FAN_LEVEL: u8 = b'P';
pub const SYMBOL_FAN_OFF: u8 = b'f';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    Heater(bool),
    Fan(u8),
    Humidifier(bool),
}

impl ActuatorCommand {
    pub fn encode(self) -> Vec<u8> {
        match self {
            Self::Heater(true) => vec![SYMBOL_HEATER_ON],
            Self::Heater(false) => vec![SYMBOL_HEATER_OFF],
            Self::Humidifier(true) => vec![SYMBOL_HUMIDIFIER_ON],
            Self::Humidifier(false) => vec![SYMBOL_HUMIDIFIER_OFF],
            Self::Fan(0) => vec![SYMBOL_FAN_OFF],
            Self::Fan(level) => vec![SYMBOL_FAN_LEVEL, level],
        }
    }
}

/// Last state successfully commanded to each actuator. `None` means unknown,
/// which is the case after the link (and with it the device) was reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommandTracker {
    pub heater: Option<bool>,
    pub fan: Option<u8>,
    pub humidifier: Option<bool>,
}

impl CommandTracker {
    /// Commands needed to move the device to `update`, in heater, fan,
    /// humidifier order. Actuators already in the desired state are skipped.
    pub fn pending(&self, update: &ActuatorUpdate) -> Vec<ActuatorCommand> {
        let mut commands = Vec::new();

        if let Some(heater) = update.heater.filter(|desired| self.heater != Some(*desired)) {
            commands.push(ActuatorCommand::Heater(heater));
        }
        if let Some(fan) = update.fan.filter(|desired| self.fan != Some(*desired)) {
            commands.push(ActuatorCommand::Fan(fan));
        }
        if let Some(humidifier) = update
            .humidifier
            .filter(|desired| self.humidifier != Some(*desired))
        {
            commands.push(ActuatorCommand::Humidifier(humidifier));
        }

        commands
    }

    pub fn record(&mut self, command: ActuatorCommand) {
        match command {
            ActuatorCommand::Heater(on) => self.heater = Some(on),
            ActuatorCommand::Fan(level) => self.fan = Some(level),
            ActuatorCommand::Humidifier(on) => self.humidifier = Some(on),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn levels(&self) -> Option<ActuatorLevels> {
        Some(ActuatorLevels {
            heater: self.heater?,
            fan: self.fan?,
            humidifier: self.humidifier?,
        })
    }
}
