//! Climate entity for a Tuya thermostat on the local network
//!
//! [`TuyaClimate`] implements the [`ClimateEntity`] capability the entity
//! framework drives. It turns intents (temperature, hvac mode, preset) into
//! datapoint writes on a [`tuya_device::DeviceSession`], and decodes the raw
//! status back into a typed [`tuya_core::ClimateState`] on every refresh.
//!
//! Around it:
//! - [`setup_platform`] builds an entity from a validated platform config
//! - [`handle_service_call`] routes `climate.*` service calls to an entity
//! - [`spawn_polling`] refreshes an entity on the scan interval

mod controller;
mod entity;
mod error;
mod platform;
mod polling;
mod services;

pub use controller::{RetryPolicy, TuyaClimate, TuyaClimateBuilder, DEFAULT_SETTLE_DELAY};
pub use entity::{ClimateDefaults, ClimateEntity, NoopScheduler, UpdateScheduler};
pub use error::{CommandError, RefreshError, SetupError};
pub use platform::setup_platform;
pub use polling::{spawn_polling, DEFAULT_SCAN_INTERVAL};
pub use services::{handle_service_call, ClimateService, ServiceError};
