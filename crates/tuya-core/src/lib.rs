//! Core types for the localtuya climate adapter
//!
//! This crate provides the fundamental types shared by the device session and
//! the climate entity: raw datapoint payloads (`RawStatus`, `DpsValue`), the
//! typed climate model (`ClimateState`, `HvacMode`, `PresetMode`), and the
//! framework-facing `EntityId`, `EntityState` and `ServiceCall`.

mod climate;
mod dps;
mod entity_id;
mod service_call;
mod state;

pub use climate::{
    decode_temperature, encode_temperature, hvac_mode_from_channels, ClimateEntityFeature,
    ClimateState, HvacMode, ParseModeError, PresetMode, TemperatureUnit,
};
pub use dps::{DecodeError, DpsValue, RawStatus};
pub use entity_id::{EntityId, EntityIdError};
pub use service_call::ServiceCall;
pub use state::EntityState;

/// Entity domain served by this adapter
pub const CLIMATE_DOMAIN: &str = "climate";

/// Datapoint channels exposed by the thermostat firmware
///
/// The numbering is fixed by the device and must not be changed.
pub mod channels {
    /// Power on/off (bool)
    pub const POWER: &str = "1";

    /// Target temperature in half degrees Celsius (int)
    pub const TARGET_TEMPERATURE: &str = "2";

    /// Measured temperature in half degrees Celsius (int)
    pub const CURRENT_TEMPERATURE: &str = "3";

    /// Schedule flag (string, see `MODE_AUTO` / `MODE_MANUAL`)
    pub const MODE: &str = "4";

    /// Away / eco preset (bool)
    pub const AWAY: &str = "5";

    /// Value of `MODE` when the device follows its internal schedule
    pub const MODE_AUTO: &str = "0";

    /// Value of `MODE` when the device holds the manual setpoint
    pub const MODE_MANUAL: &str = "1";
}

/// Standard attribute names on the climate entity state
pub mod attributes {
    pub const CURRENT_TEMPERATURE: &str = "current_temperature";
    pub const TEMPERATURE: &str = "temperature";
    pub const MIN_TEMP: &str = "min_temp";
    pub const MAX_TEMP: &str = "max_temp";
    pub const TARGET_TEMP_STEP: &str = "target_temp_step";
    pub const HVAC_MODES: &str = "hvac_modes";
    pub const PRESET_MODE: &str = "preset_mode";
    pub const PRESET_MODES: &str = "preset_modes";
    pub const FRIENDLY_NAME: &str = "friendly_name";
    pub const SUPPORTED_FEATURES: &str = "supported_features";
}
