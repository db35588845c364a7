//! Typed climate model decoded from thermostat datapoints

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channels;
use crate::dps::{DecodeError, RawStatus};

/// Error for mode strings that are not part of the supported set
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized {kind}: {value}")]
pub struct ParseModeError {
    pub kind: &'static str,
    pub value: String,
}

/// HVAC operating mode
///
/// Derived from the power and schedule channels, the device does not
/// store it as a single datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    /// Powered, holding the manual setpoint
    Heat,
    /// Powered, following the device's internal schedule
    Auto,
    #[default]
    Off,
}

impl HvacMode {
    /// All modes offered by the thermostat, in display order
    pub const ALL: [HvacMode; 3] = [HvacMode::Heat, HvacMode::Auto, HvacMode::Off];

    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Heat => "heat",
            HvacMode::Auto => "auto",
            HvacMode::Off => "off",
        }
    }
}

impl FromStr for HvacMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heat" => Ok(HvacMode::Heat),
            "auto" => Ok(HvacMode::Auto),
            "off" => Ok(HvacMode::Off),
            other => Err(ParseModeError {
                kind: "hvac mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preset overlay on top of the hvac mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetMode {
    Away,
    #[default]
    None,
}

impl PresetMode {
    pub const ALL: [PresetMode; 2] = [PresetMode::Away, PresetMode::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetMode::Away => "away",
            PresetMode::None => "none",
        }
    }
}

impl FromStr for PresetMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "away" => Ok(PresetMode::Away),
            "none" => Ok(PresetMode::None),
            other => Err(ParseModeError {
                kind: "preset mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PresetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit the entity reports temperatures in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "°C")]
    Celsius,
}

/// Feature bitmask advertised to the entity framework
///
/// Bit values match the framework's `ClimateEntityFeature` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClimateEntityFeature(u32);

impl ClimateEntityFeature {
    pub const TARGET_TEMPERATURE: Self = Self(1);
    pub const PRESET_MODE: Self = Self(16);

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ClimateEntityFeature {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Encode a Celsius setpoint into the half-degree integer the device expects
///
/// Ties round to the even half degree, so 21.25 encodes as 42 and 21.75 as 44.
pub fn encode_temperature(celsius: f64) -> i64 {
    (celsius * 2.0).round_ties_even() as i64
}

/// Decode a half-degree integer into Celsius
pub fn decode_temperature(raw: i64) -> f64 {
    raw as f64 / 2.0
}

/// Derive the hvac mode from the power and schedule channels
///
/// Returns `None` when the device is powered but reports a schedule flag
/// outside the known values.
pub fn hvac_mode_from_channels(power: bool, mode_flag: &str) -> Option<HvacMode> {
    if !power {
        return Some(HvacMode::Off);
    }
    match mode_flag {
        channels::MODE_AUTO => Some(HvacMode::Auto),
        channels::MODE_MANUAL => Some(HvacMode::Heat),
        _ => None,
    }
}

/// Last known typed state of the thermostat
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClimateState {
    /// Setpoint in °C, `None` until the device has reported one
    pub target_temperature: Option<f64>,
    /// Measured temperature in °C
    pub current_temperature: Option<f64>,
    pub power: bool,
    pub hvac_mode: HvacMode,
    pub preset_mode: PresetMode,
}

impl ClimateState {
    /// Decode a full state from a status payload
    ///
    /// All five channels must be present with their firmware types. When the
    /// schedule flag is unknown the previous hvac mode is carried over.
    pub fn decode(status: &RawStatus, previous: &ClimateState) -> Result<Self, DecodeError> {
        let power = status.bool(channels::POWER)?;
        let target = status.int(channels::TARGET_TEMPERATURE)?;
        let current = status.int(channels::CURRENT_TEMPERATURE)?;
        let mode_flag = status.string(channels::MODE)?;
        let away = status.bool(channels::AWAY)?;

        Ok(Self {
            target_temperature: Some(decode_temperature(target)),
            current_temperature: Some(decode_temperature(current)),
            power,
            hvac_mode: hvac_mode_from_channels(power, mode_flag).unwrap_or(previous.hvac_mode),
            preset_mode: if away {
                PresetMode::Away
            } else {
                PresetMode::None
            },
        })
    }
}
