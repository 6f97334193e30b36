use crate::{
    config::ThermostatConfig,
    types::{ActuatorLevels, ControlState, ReadingFields, ThermostatMode, ThermostatState},
};

/// Computes one decision cycle.
///
/// `previous` is the last automatic decision; the heater and humidifier keep
/// it while the reading sits inside their dead bands. Manual overrides in
/// `control` replace the automatic value per actuator.
pub fn compute_levels(
    config: &ThermostatConfig,
    reading: &ReadingFields,
    control: &ControlState,
    previous: ActuatorLevels,
) -> ActuatorLevels {
    let automatic = automatic_levels(config, reading, control, previous);
    apply_manual_overrides(automatic, control)
}

fn automatic_levels(
    config: &ThermostatConfig,
    reading: &ReadingFields,
    control: &ControlState,
    previous: ActuatorLevels,
) -> ActuatorLevels {
    if control.mode == ThermostatMode::Off {
        return ActuatorLevels::OFF;
    }

    let setpoint = control.effective_setpoint();

    let (heater, fan) = match reading.temperature {
        Some(temp) => (
            heater_decision(config, temp, setpoint, previous.heater),
            fan_level(config, temp, setpoint),
        ),
        None => (previous.heater, 0),
    };

    let humidifier = match reading.humidity {
        Some(humidity) => humidifier_decision(config, humidity, previous.humidifier),
        None => previous.humidifier,
    };

    ActuatorLevels {
        heater,
        fan,
        humidifier,
    }
}

fn heater_decision(config: &ThermostatConfig, temp: f64, setpoint: f64, previous: bool) -> bool {
    let lower_bound = setpoint - config.heater_hysteresis;
    let upper_bound = setpoint + config.heater_hysteresis;

    if temp < lower_bound {
        true
    } else if temp > upper_bound {
        false
    } else {
        previous
    }
}

fn fan_level(config: &ThermostatConfig, temp: f64, setpoint: f64) -> u8 {
    if temp <= setpoint + config.fan_start_offset {
        return 0;
    }
    ((temp - setpoint) * config.fan_gain).round().clamp(0.0, 255.0) as u8
}

fn humidifier_decision(config: &ThermostatConfig, humidity: f64, previous: bool) -> bool {
    if humidity < config.humidity_low {
        true
    } else if humidity > config.humidity_high {
        false
    } else {
        previous
    }
}

fn apply_manual_overrides(levels: ActuatorLevels, control: &ControlState) -> ActuatorLevels {
    if control.mode == ThermostatMode::Off {
        return levels;
    }
    let overrides = control.manual_overrides();
    ActuatorLevels {
        heater: overrides.heater.unwrap_or(levels.heater),
        fan: overrides.fan.unwrap_or(levels.fan),
        humidifier: overrides.humidifier.unwrap_or(levels.humidifier),
    }
}

#[derive(Debug, Clone)]
pub struct ThermostatEngine {
    pub config: ThermostatConfig,
    automatic: ActuatorLevels,
    applied: ActuatorLevels,
    state: ThermostatState,
}

impl ThermostatEngine {
    pub fn new(mut config: ThermostatConfig) -> Self {
        config.sanitize();
        Self {
            config,
            automatic: ActuatorLevels::OFF,
            applied: ActuatorLevels::OFF,
            state: ThermostatState::Idle,
        }
    }

    pub fn decide(&mut self, reading: &ReadingFields, control: &ControlState) -> ActuatorLevels {
        self.automatic = automatic_levels(&self.config, reading, control, self.automatic);
        self.applied = apply_manual_overrides(self.automatic, control);

        self.state = match (control.mode, self.applied) {
            (ThermostatMode::Off, _) => ThermostatState::Idle,
            (_, levels) if levels.heater => ThermostatState::Heating,
            (_, levels) if levels.fan > 0 => ThermostatState::Cooling,
            _ => ThermostatState::Satisfied,
        };

        self.applied
    }

    pub fn last_levels(&self) -> ActuatorLevels {
        self.applied
    }

    pub fn state(&self) -> ThermostatState {
        self.state
    }
}
