//! Climate controller for a Tuya thermostat

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use tuya_core::{
    channels, decode_temperature, encode_temperature, ClimateEntityFeature, ClimateState,
    EntityId, HvacMode, PresetMode, TemperatureUnit,
};
use tuya_device::{DeviceSession, SessionError};

use crate::entity::{ClimateDefaults, ClimateEntity, NoopScheduler, UpdateScheduler};
use crate::error::{CommandError, RefreshError, SetupError};

/// Pause after a write so the device applies it before the next read
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Setpoint granularity of the device in °C
const TEMPERATURE_STEP: f64 = 0.5;

/// How `set_temperature` retries a failed write sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// `None` retries until the write goes through
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn forever() -> Self {
        Self::default()
    }

    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Builder for [`TuyaClimate`]
pub struct TuyaClimateBuilder {
    name: String,
    device_id: String,
    session: DeviceSession,
    min_temp: Option<f64>,
    max_temp: Option<f64>,
    defaults: ClimateDefaults,
    scheduler: Arc<dyn UpdateScheduler>,
    settle_delay: Duration,
    temperature_retry: RetryPolicy,
}

impl TuyaClimateBuilder {
    /// Device id, used for the entity id when the name has no usable characters
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn min_temp(mut self, min_temp: Option<f64>) -> Self {
        self.min_temp = min_temp;
        self
    }

    pub fn max_temp(mut self, max_temp: Option<f64>) -> Self {
        self.max_temp = max_temp;
        self
    }

    pub fn defaults(mut self, defaults: ClimateDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn UpdateScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn temperature_retry(mut self, policy: RetryPolicy) -> Self {
        self.temperature_retry = policy;
        self
    }

    /// Fetch the initial status and build the entity
    ///
    /// A device that cannot be read fails the setup. A status that cannot be
    /// decoded leaves the state unknown until the first successful refresh.
    pub async fn connect(self) -> Result<TuyaClimate, SetupError> {
        let entity_id = EntityId::climate_from_name(&self.name, &self.device_id)?;
        let status = self.session.status().await?;

        let state = match ClimateState::decode(&status, &ClimateState::default()) {
            Ok(state) => state,
            Err(err) => {
                debug!(%entity_id, error = %err, "Initial status incomplete");
                ClimateState::default()
            }
        };

        info!(%entity_id, hvac_mode = %state.hvac_mode, "Climate entity ready");

        Ok(TuyaClimate {
            name: self.name,
            entity_id,
            session: self.session,
            command_lock: Mutex::new(()),
            state: RwLock::new(state),
            min_temp: self.min_temp,
            max_temp: self.max_temp,
            defaults: self.defaults,
            scheduler: self.scheduler,
            settle_delay: self.settle_delay,
            temperature_retry: self.temperature_retry,
        })
    }
}

/// A Tuya thermostat exposed as a climate entity
///
/// Every command runs under one command lock, settle delay included, so
/// multi-write commands never interleave. `refresh` does not take that lock
/// and can observe a command halfway through; the decoded state is swapped in
/// whole, so readers never see a mix of two refreshes.
pub struct TuyaClimate {
    name: String,
    entity_id: EntityId,
    session: DeviceSession,
    command_lock: Mutex<()>,
    state: RwLock<ClimateState>,
    min_temp: Option<f64>,
    max_temp: Option<f64>,
    defaults: ClimateDefaults,
    scheduler: Arc<dyn UpdateScheduler>,
    settle_delay: Duration,
    temperature_retry: RetryPolicy,
}

impl TuyaClimate {
    pub fn builder(name: impl Into<String>, session: DeviceSession) -> TuyaClimateBuilder {
        TuyaClimateBuilder {
            name: name.into(),
            device_id: String::new(),
            session,
            min_temp: None,
            max_temp: None,
            defaults: ClimateDefaults::default(),
            scheduler: Arc::new(NoopScheduler),
            settle_delay: DEFAULT_SETTLE_DELAY,
            temperature_retry: RetryPolicy::forever(),
        }
    }

    /// Copy of the cached typed state
    pub fn state(&self) -> ClimateState {
        *self.state.read().unwrap()
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// One locked attempt of the temperature write sequence
    async fn write_temperature(&self, raw: i64) -> Result<(), SessionError> {
        let _guard = self.command_lock.lock().await;
        debug!(raw, "Set temperature");

        self.session.write(raw, channels::TARGET_TEMPERATURE).await?;
        tokio::time::sleep(self.settle_delay).await;

        self.state.write().unwrap().target_temperature = Some(decode_temperature(raw));
        Ok(())
    }

    /// Settle, then ask the framework to write the new state
    async fn settle_and_schedule(&self) {
        tokio::time::sleep(self.settle_delay).await;
        self.scheduler.schedule_update(&self.entity_id);
    }
}

#[async_trait]
impl ClimateEntity for TuyaClimate {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn target_temperature(&self) -> Option<f64> {
        self.state.read().unwrap().target_temperature
    }

    fn current_temperature(&self) -> Option<f64> {
        self.state.read().unwrap().current_temperature
    }

    fn hvac_mode(&self) -> HvacMode {
        self.state.read().unwrap().hvac_mode
    }

    fn preset_mode(&self) -> PresetMode {
        self.state.read().unwrap().preset_mode
    }

    fn hvac_modes(&self) -> &[HvacMode] {
        &HvacMode::ALL
    }

    fn preset_modes(&self) -> &[PresetMode] {
        &PresetMode::ALL
    }

    fn min_temp(&self) -> f64 {
        self.min_temp.unwrap_or(self.defaults.min_temp)
    }

    fn max_temp(&self) -> f64 {
        self.max_temp.unwrap_or(self.defaults.max_temp)
    }

    fn temperature_unit(&self) -> TemperatureUnit {
        TemperatureUnit::Celsius
    }

    fn target_temperature_step(&self) -> f64 {
        TEMPERATURE_STEP
    }

    fn supported_features(&self) -> ClimateEntityFeature {
        ClimateEntityFeature::TARGET_TEMPERATURE | ClimateEntityFeature::PRESET_MODE
    }

    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    async fn turn_on(&self) -> Result<(), CommandError> {
        let _guard = self.command_lock.lock().await;
        self.session.write(true, channels::POWER).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    async fn turn_off(&self) -> Result<(), CommandError> {
        let _guard = self.command_lock.lock().await;
        self.session.write(false, channels::POWER).await?;
        Ok(())
    }

    /// Write the setpoint, retrying the whole locked sequence on failure
    ///
    /// The lock is released between attempts so other commands can run.
    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    async fn set_temperature(&self, celsius: f64) -> Result<(), CommandError> {
        if !celsius.is_finite() {
            error!("Unrecognized temperature: {}", celsius);
            return Ok(());
        }

        let raw = encode_temperature(celsius);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match self.write_temperature(raw).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if self.temperature_retry.is_exhausted(attempts) {
                warn!(attempts, error = %err, "Set temperature failed, giving up");
                return Err(CommandError::RetriesExhausted {
                    attempts,
                    source: err,
                });
            }
            warn!(attempts, error = %err, "Set temperature retry");
            tokio::task::yield_now().await;
        }
    }

    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    async fn set_hvac_mode(&self, hvac_mode: &str) -> Result<(), CommandError> {
        let _guard = self.command_lock.lock().await;

        let Ok(mode) = hvac_mode.parse::<HvacMode>() else {
            error!("Unrecognized operation mode: {}", hvac_mode);
            return Ok(());
        };

        match mode {
            HvacMode::Heat => {
                self.session.write(true, channels::POWER).await?;
                self.session
                    .write(channels::MODE_MANUAL, channels::MODE)
                    .await?;
            }
            HvacMode::Auto => {
                self.session.write(true, channels::POWER).await?;
                self.session.write(channels::MODE_AUTO, channels::MODE).await?;
            }
            HvacMode::Off => {
                self.session.write(false, channels::POWER).await?;
            }
        }

        {
            let mut state = self.state.write().unwrap();
            state.power = mode != HvacMode::Off;
            state.hvac_mode = mode;
        }

        self.settle_and_schedule().await;
        Ok(())
    }

    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    async fn set_preset_mode(&self, preset_mode: &str) -> Result<(), CommandError> {
        let _guard = self.command_lock.lock().await;

        let Ok(preset) = preset_mode.parse::<PresetMode>() else {
            error!("Unrecognized preset mode: {}", preset_mode);
            return Ok(());
        };

        self.session
            .write(preset == PresetMode::Away, channels::AWAY)
            .await?;
        self.state.write().unwrap().preset_mode = preset;

        self.settle_and_schedule().await;
        Ok(())
    }

    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    async fn refresh(&self) -> Result<ClimateState, RefreshError> {
        debug!("Updating");

        let result = async {
            let status = self.session.status().await?;
            if let Some(dev_id) = &status.dev_id {
                debug!(device = %dev_id, "Status received");
            }

            let mut state = self.state.write().unwrap();
            let next = ClimateState::decode(&status, &state)?;
            *state = next;
            Ok::<_, RefreshError>(next)
        }
        .await;

        if let Err(err) = &result {
            debug!(error = %err, "Update failed, maybe device busy");
        }
        result
    }
}
