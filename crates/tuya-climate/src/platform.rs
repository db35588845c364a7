//! Builds climate entities from `platform: localtuya` entries

use std::sync::Arc;

use tracing::info;
use tuya_config::TuyaClimateConfig;
use tuya_device::{DeviceLink, DeviceSession};

use crate::controller::{RetryPolicy, TuyaClimate};
use crate::entity::{ClimateDefaults, UpdateScheduler};
use crate::error::SetupError;

/// Create the entity for one configured thermostat
///
/// The link is handed over to a new session for the entity's lifetime and
/// the initial status fetch must succeed.
pub async fn setup_platform(
    config: &TuyaClimateConfig,
    link: impl DeviceLink + 'static,
    defaults: ClimateDefaults,
    scheduler: Arc<dyn UpdateScheduler>,
) -> Result<TuyaClimate, SetupError> {
    config.validate().map_err(SetupError::Config)?;

    let version = config.protocol_version();
    info!(
        device_id = %config.device_id,
        host = %config.host,
        version,
        "Setting up localtuya climate"
    );

    let retry = match config.temperature_retry_attempts {
        Some(attempts) => RetryPolicy::bounded(attempts),
        None => RetryPolicy::forever(),
    };

    TuyaClimate::builder(config.display_name(), DeviceSession::new(link, version))
        .device_id(&config.device_id)
        .min_temp(config.min_temp)
        .max_temp(config.max_temp)
        .defaults(defaults)
        .scheduler(scheduler)
        .temperature_retry(retry)
        .connect()
        .await
}
