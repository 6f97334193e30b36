use crate::types::{ControlPatch, ControlState};

pub const SETPOINT_STEP: f64 = 0.5;
pub const MANUAL_FAN_LEVEL: u8 = 100;

/// Commands the device emits when its local buttons are pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideToken {
    EnableOverride,
    DisableOverride,
    SetpointUp,
    SetpointDown,
    HeaterOn,
    HeaterOff,
    FanOn,
    FanOff,
}

impl OverrideToken {
    pub const ALL: [Self; 8] = [
        Self::EnableOverride,
        Self::DisableOverride,
        Self::SetpointUp,
        Self::SetpointDown,
        Self::HeaterOn,
        Self::HeaterOff,
        Self::FanOn,
        Self::FanOff,
    ];

    /// Exact, case-sensitive match against the firmware vocabulary.
    pub fn parse(line: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|token| token.as_wire() == line.trim())
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::EnableOverride => "O1",
            Self::DisableOverride => "O0",
            Self::SetpointUp => "SP+",
            Self::SetpointDown => "SP-",
            Self::HeaterOn => "H",
            Self::HeaterOff => "h",
            Self::FanOn => "F",
            Self::FanOff => "f",
        }
    }

    /// The single-field mutation this token applies to `state`.
    pub fn reconcile(self, state: &ControlState) -> ControlPatch {
        let base = state.override_setpoint.unwrap_or(state.setpoint);

        match self {
            Self::EnableOverride => ControlPatch {
                override_mode: Some(true),
                ..ControlPatch::default()
            },
            Self::DisableOverride => ControlPatch {
                override_mode: Some(false),
                ..ControlPatch::default()
            },
            Self::SetpointUp => ControlPatch {
                override_setpoint: Some(base + SETPOINT_STEP),
                ..ControlPatch::default()
            },
            Self::SetpointDown => ControlPatch {
                override_setpoint: Some(base - SETPOINT_STEP),
                ..ControlPatch::default()
            },
            Self::HeaterOn | Self::HeaterOff => ControlPatch {
                manual_heater: Some(self == Self::HeaterOn),
                ..ControlPatch::default()
            },
            Self::FanOn => ControlPatch {
                manual_fan: Some(MANUAL_FAN_LEVEL),
                ..ControlPatch::default()
            },
            Self::FanOff => ControlPatch {
                manual_fan: Some(0),
                ..ControlPatch::default()
            },
        }
    }
}
