//! Holding-register map of the TSTAT family of thermostats.

use serde::Serialize;
use std::fmt;

/// Bus address of the device. Writing it relocates the thermostat.
pub const MODBUS_ADDRESS: u16 = 6;
/// Model identifier, also used as the presence probe.
pub const MODEL_IDENTIFIER: u16 = 7;
/// Relay output bitmap, honoured only while manual output mode is armed.
pub const DIGITAL_OUTPUT_STATUS: u16 = 209;
pub const OUTPUT_MANUAL_ENABLE: u16 = 254;
pub const HEATING_SETPOINT: u16 = 345;
pub const COOLING_SETPOINT: u16 = 350;
pub const CLOCK_HOUR: u16 = 414;
pub const CLOCK_MINUTE: u16 = 415;

/// Value for `OUTPUT_MANUAL_ENABLE` that puts all five relays under manual control.
pub const MANUAL_OUTPUTS_ALL: u16 = 31;

pub const MIN_SLAVE_ID: u8 = 1;
pub const MAX_SLAVE_ID: u8 = 254;

pub fn is_valid_slave_id(id: u16) -> bool {
    (MIN_SLAVE_ID as u16..=MAX_SLAVE_ID as u16).contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThermostatModel {
    Tstat5C,
    Tstat5E,
    Tstat5I,
    Tstat6,
    Tstat7,
    Humidity,
}

impl ThermostatModel {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            4 | 12 => Some(Self::Tstat5C),
            6 => Some(Self::Tstat6),
            8 => Some(Self::Tstat5I),
            16 => Some(Self::Tstat5E),
            93 => Some(Self::Tstat7),
            213 => Some(Self::Humidity),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tstat5C => "TSTAT5C",
            Self::Tstat5E => "TSTAT5E",
            Self::Tstat5I => "TSTAT5I",
            Self::Tstat6 => "TSTAT6",
            Self::Tstat7 => "TSTAT7",
            Self::Humidity => "HUM",
        }
    }
}

impl fmt::Display for ThermostatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn describe_model(code: u16) -> String {
    match ThermostatModel::from_code(code) {
        Some(model) => model.to_string(),
        None => format!("unknown model {}", code),
    }
}
