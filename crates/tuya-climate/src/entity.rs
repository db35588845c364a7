//! The climate capability consumed by the entity framework

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::trace;
use tuya_core::{
    attributes, ClimateEntityFeature, ClimateState, EntityId, EntityState, HvacMode, PresetMode,
    TemperatureUnit,
};

use crate::error::{CommandError, RefreshError};

/// Framework-wide temperature bounds used when an entity has none configured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateDefaults {
    pub min_temp: f64,
    pub max_temp: f64,
}

impl Default for ClimateDefaults {
    fn default() -> Self {
        Self {
            min_temp: 7.0,
            max_temp: 35.0,
        }
    }
}

/// Callback into the framework to write an entity's state out of band
pub trait UpdateScheduler: Send + Sync {
    fn schedule_update(&self, entity_id: &EntityId);
}

/// Scheduler for entities that are not attached to a framework
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl UpdateScheduler for NoopScheduler {
    fn schedule_update(&self, entity_id: &EntityId) {
        trace!(%entity_id, "State update requested with no scheduler attached");
    }
}

impl UpdateScheduler for mpsc::UnboundedSender<EntityId> {
    fn schedule_update(&self, entity_id: &EntityId) {
        // A closed receiver means the framework is shutting down
        let _ = self.send(entity_id.clone());
    }
}

/// A climate device as seen by the entity framework
///
/// Mode arguments are plain strings because the framework passes them
/// through unvalidated; implementations log and ignore unknown values.
#[async_trait]
pub trait ClimateEntity: Send + Sync {
    fn name(&self) -> &str;
    fn entity_id(&self) -> &EntityId;

    fn target_temperature(&self) -> Option<f64>;
    fn current_temperature(&self) -> Option<f64>;
    fn hvac_mode(&self) -> HvacMode;
    fn preset_mode(&self) -> PresetMode;
    fn hvac_modes(&self) -> &[HvacMode];
    fn preset_modes(&self) -> &[PresetMode];
    fn min_temp(&self) -> f64;
    fn max_temp(&self) -> f64;
    fn temperature_unit(&self) -> TemperatureUnit;
    fn target_temperature_step(&self) -> f64;
    fn supported_features(&self) -> ClimateEntityFeature;

    async fn turn_on(&self) -> Result<(), CommandError>;
    async fn turn_off(&self) -> Result<(), CommandError>;
    async fn set_temperature(&self, celsius: f64) -> Result<(), CommandError>;
    async fn set_hvac_mode(&self, hvac_mode: &str) -> Result<(), CommandError>;
    async fn set_preset_mode(&self, preset_mode: &str) -> Result<(), CommandError>;

    /// Fetch the device status and replace the cached state
    async fn refresh(&self) -> Result<ClimateState, RefreshError>;

    /// Attributes published alongside the hvac mode
    fn state_attributes(&self) -> HashMap<String, Value> {
        let features = self.supported_features();
        let hvac_modes: Vec<&str> = self.hvac_modes().iter().map(HvacMode::as_str).collect();

        let mut attrs = HashMap::from([
            (attributes::FRIENDLY_NAME.to_string(), json!(self.name())),
            (attributes::HVAC_MODES.to_string(), json!(hvac_modes)),
            (attributes::MIN_TEMP.to_string(), json!(self.min_temp())),
            (attributes::MAX_TEMP.to_string(), json!(self.max_temp())),
            (
                attributes::TARGET_TEMP_STEP.to_string(),
                json!(self.target_temperature_step()),
            ),
            (
                attributes::CURRENT_TEMPERATURE.to_string(),
                json!(self.current_temperature()),
            ),
            (
                attributes::SUPPORTED_FEATURES.to_string(),
                json!(features.bits()),
            ),
        ]);

        if features.contains(ClimateEntityFeature::TARGET_TEMPERATURE) {
            attrs.insert(
                attributes::TEMPERATURE.to_string(),
                json!(self.target_temperature()),
            );
        }

        if features.contains(ClimateEntityFeature::PRESET_MODE) {
            let preset_modes: Vec<&str> =
                self.preset_modes().iter().map(PresetMode::as_str).collect();
            attrs.insert(
                attributes::PRESET_MODE.to_string(),
                json!(self.preset_mode().as_str()),
            );
            attrs.insert(attributes::PRESET_MODES.to_string(), json!(preset_modes));
        }

        attrs
    }

    /// Snapshot for the framework's state machine
    fn entity_state(&self, previous: Option<&EntityState>) -> EntityState {
        let state = self.hvac_mode().as_str();
        let attributes = self.state_attributes();
        match previous {
            Some(previous) => previous.with_update(state, attributes),
            None => EntityState::new(self.entity_id().clone(), state, attributes),
        }
    }
}
