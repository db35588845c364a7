//! Routing of `climate.*` service calls to an entity

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tuya_core::{ServiceCall, CLIMATE_DOMAIN};

use crate::entity::ClimateEntity;
use crate::error::CommandError;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service call failed: {0}")]
    CallFailed(String),
}

impl From<CommandError> for ServiceError {
    fn from(err: CommandError) -> Self {
        ServiceError::CallFailed(err.to_string())
    }
}

/// A climate service with its typed payload
#[derive(Debug, Clone, PartialEq)]
pub enum ClimateService {
    TurnOn,
    TurnOff,
    SetTemperature { temperature: f64 },
    SetHvacMode { hvac_mode: String },
    SetPresetMode { preset_mode: String },
}

#[derive(Deserialize)]
struct TemperatureData {
    temperature: f64,
}

#[derive(Deserialize)]
struct HvacModeData {
    hvac_mode: String,
}

#[derive(Deserialize)]
struct PresetModeData {
    preset_mode: String,
}

impl ClimateService {
    /// Parse a service call, checking domain, service name and payload shape
    pub fn from_call(call: &ServiceCall) -> Result<Self, ServiceError> {
        if call.domain != CLIMATE_DOMAIN {
            return Err(not_found(call));
        }

        let invalid = |e: serde_json::Error| ServiceError::InvalidData(e.to_string());
        let service = match call.service.as_str() {
            "turn_on" => ClimateService::TurnOn,
            "turn_off" => ClimateService::TurnOff,
            "set_temperature" => {
                let data: TemperatureData = call.data().map_err(invalid)?;
                ClimateService::SetTemperature {
                    temperature: data.temperature,
                }
            }
            "set_hvac_mode" => {
                let data: HvacModeData = call.data().map_err(invalid)?;
                ClimateService::SetHvacMode {
                    hvac_mode: data.hvac_mode,
                }
            }
            "set_preset_mode" => {
                let data: PresetModeData = call.data().map_err(invalid)?;
                ClimateService::SetPresetMode {
                    preset_mode: data.preset_mode,
                }
            }
            _ => return Err(not_found(call)),
        };
        Ok(service)
    }
}

fn not_found(call: &ServiceCall) -> ServiceError {
    ServiceError::NotFound {
        domain: call.domain.clone(),
        service: call.service.clone(),
    }
}

/// Run `call` against `entity`
///
/// Returns `Ok(false)` when the call targets other entities. Temperatures
/// outside the entity's bounds are rejected before anything is written.
pub async fn handle_service_call(
    entity: &dyn ClimateEntity,
    call: &ServiceCall,
) -> Result<bool, ServiceError> {
    let service = ClimateService::from_call(call)?;
    if !call.targets(entity.entity_id()) {
        return Ok(false);
    }

    debug!(entity_id = %entity.entity_id(), service = %call.service_id(), "Handling service call");

    match service {
        ClimateService::TurnOn => entity.turn_on().await?,
        ClimateService::TurnOff => entity.turn_off().await?,
        ClimateService::SetTemperature { temperature } => {
            let (min, max) = (entity.min_temp(), entity.max_temp());
            if !(min..=max).contains(&temperature) {
                return Err(ServiceError::InvalidData(format!(
                    "temperature {} outside of range [{}, {}]",
                    temperature, min, max
                )));
            }
            entity.set_temperature(temperature).await?
        }
        ClimateService::SetHvacMode { hvac_mode } => entity.set_hvac_mode(&hvac_mode).await?,
        ClimateService::SetPresetMode { preset_mode } => {
            entity.set_preset_mode(&preset_mode).await?
        }
    }

    Ok(true)
}
