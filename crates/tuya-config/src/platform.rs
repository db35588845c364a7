//! Schema for `platform: localtuya` climate entries

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Platform name that selects this adapter
pub const PLATFORM: &str = "localtuya";

/// Protocol version used when the entry does not set one
pub const DEFAULT_PROTOCOL_VERSION: f32 = 3.3;

/// Protocol versions the device link can speak
pub const SUPPORTED_PROTOCOL_VERSIONS: [f32; 2] = [3.1, 3.3];

/// Length of a Tuya local key (AES-128)
const LOCAL_KEY_LEN: usize = 16;

/// One configured thermostat
#[derive(Clone, PartialEq, Deserialize)]
pub struct TuyaClimateConfig {
    /// Display name; the device id is used when absent
    #[serde(default)]
    pub name: Option<String>,

    /// Device address on the local network
    pub host: String,

    pub device_id: String,

    /// Shared secret used to encrypt the device traffic
    pub local_key: String,

    #[serde(default)]
    pub min_temp: Option<f64>,

    #[serde(default)]
    pub max_temp: Option<f64>,

    #[serde(default)]
    pub protocol_version: Option<f32>,

    /// Bound on `set_temperature` attempts; unbounded when absent
    #[serde(default)]
    pub temperature_retry_attempts: Option<u32>,
}

impl TuyaClimateConfig {
    /// Name shown by the entity
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.device_id)
    }

    pub fn protocol_version(&self) -> f32 {
        self.protocol_version.unwrap_or(DEFAULT_PROTOCOL_VERSION)
    }

    /// Check the constraints serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in [
            ("host", &self.host),
            ("device_id", &self.device_id),
            ("local_key", &self.local_key),
        ] {
            if value.trim().is_empty() {
                return Err(format!("'{}' must not be empty", key));
            }
        }

        if self.local_key.len() != LOCAL_KEY_LEN {
            return Err(format!(
                "'local_key' must be {} characters, got {}",
                LOCAL_KEY_LEN,
                self.local_key.len()
            ));
        }

        if let (Some(min), Some(max)) = (self.min_temp, self.max_temp) {
            if min >= max {
                return Err(format!(
                    "'min_temp' ({}) must be lower than 'max_temp' ({})",
                    min, max
                ));
            }
        }

        if let Some(version) = self.protocol_version {
            if !SUPPORTED_PROTOCOL_VERSIONS.contains(&version) {
                return Err(format!(
                    "unsupported 'protocol_version' {}, expected one of {:?}",
                    version, SUPPORTED_PROTOCOL_VERSIONS
                ));
            }
        }

        if self.temperature_retry_attempts == Some(0) {
            return Err("'temperature_retry_attempts' must be at least 1".to_string());
        }

        Ok(())
    }
}

impl fmt::Debug for TuyaClimateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TuyaClimateConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("device_id", &self.device_id)
            .field("local_key", &"<redacted>")
            .field("min_temp", &self.min_temp)
            .field("max_temp", &self.max_temp)
            .field("protocol_version", &self.protocol_version)
            .field("temperature_retry_attempts", &self.temperature_retry_attempts)
            .finish()
    }
}

/// Extract and validate every localtuya entry under `climate:`
///
/// `climate:` may hold a single mapping or a list; entries for other
/// platforms are skipped.
pub fn platform_configs_from_value(root: &Value) -> ConfigResult<Vec<TuyaClimateConfig>> {
    let entries: Vec<&Value> = match root.get("climate") {
        None | Some(Value::Null) => {
            debug!("No climate section in configuration");
            return Ok(Vec::new());
        }
        Some(Value::Sequence(seq)) => seq.iter().collect(),
        Some(entry @ Value::Mapping(_)) => vec![entry],
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                key: "climate".to_string(),
                reason: format!("expected a mapping or a list, got {:?}", other),
            })
        }
    };

    let mut configs = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let platform = entry.get("platform").and_then(Value::as_str);
        if platform != Some(PLATFORM) {
            debug!(index, ?platform, "Skipping climate entry for another platform");
            continue;
        }

        let invalid = |message: String| ConfigError::ValidationFailed {
            platform: PLATFORM.to_string(),
            index,
            message,
        };

        let config: TuyaClimateConfig =
            serde_yaml::from_value(entry.clone()).map_err(|e| invalid(e.to_string()))?;
        config.validate().map_err(invalid)?;

        if config.name.is_none() {
            warn!(
                device_id = %config.device_id,
                "No name configured, using device id as entity name"
            );
        }
        configs.push(config);
    }

    Ok(configs)
}

/// Load `file` from `config_dir` and return its localtuya climate entries
pub fn load_platform_configs(
    config_dir: impl Into<PathBuf>,
    file: impl AsRef<Path>,
) -> ConfigResult<Vec<TuyaClimateConfig>> {
    let root = load_yaml(config_dir, file)?;
    platform_configs_from_value(&root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const KEY: &str = "0123456789abcdef";

    fn parse(yaml: &str) -> ConfigResult<Vec<TuyaClimateConfig>> {
        let root: Value = serde_yaml::from_str(yaml).unwrap();
        platform_configs_from_value(&root)
    }

    #[test]
    fn test_single_mapping() {
        let configs = parse(&format!(
            r#"
climate:
  platform: localtuya
  name: Hallway
  host: 192.168.1.40
  device_id: bf01
  local_key: {KEY}
  min_temp: 5
  max_temp: 30.5
"#
        ))
        .unwrap();

        assert_eq!(configs.len(), 1);
        let config = &configs[0];
        assert_eq!(config.display_name(), "Hallway");
        assert_eq!(config.min_temp, Some(5.0));
        assert_eq!(config.max_temp, Some(30.5));
        assert_eq!(config.protocol_version(), DEFAULT_PROTOCOL_VERSION);
    }

    #[test]
    fn test_list_skips_other_platforms() {
        let configs = parse(&format!(
            r#"
climate:
  - platform: generic_thermostat
    heater: switch.heater
  - platform: localtuya
    host: 10.0.0.2
    device_id: bf02
    local_key: {KEY}
    protocol_version: 3.1
"#
        ))
        .unwrap();

        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].display_name(), "bf02");
        assert_eq!(configs[0].protocol_version(), 3.1);
    }

    #[test]
    fn test_missing_required_key() {
        let err = parse("climate:\n  platform: localtuya\n  host: 10.0.0.2\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed { index: 0, .. }));
        assert!(err.to_string().contains("device_id"));
    }

    #[test]
    fn test_validation_rules() {
        let base = TuyaClimateConfig {
            name: None,
            host: "10.0.0.2".to_string(),
            device_id: "bf02".to_string(),
            local_key: KEY.to_string(),
            min_temp: None,
            max_temp: None,
            protocol_version: None,
            temperature_retry_attempts: None,
        };
        assert!(base.validate().is_ok());

        let short_key = TuyaClimateConfig {
            local_key: "short".to_string(),
            ..base.clone()
        };
        assert!(short_key.validate().unwrap_err().contains("local_key"));

        let inverted = TuyaClimateConfig {
            min_temp: Some(30.0),
            max_temp: Some(10.0),
            ..base.clone()
        };
        assert!(inverted.validate().unwrap_err().contains("min_temp"));

        let bad_version = TuyaClimateConfig {
            protocol_version: Some(3.4),
            ..base.clone()
        };
        assert!(bad_version.validate().unwrap_err().contains("protocol_version"));

        let zero_retries = TuyaClimateConfig {
            temperature_retry_attempts: Some(0),
            ..base
        };
        assert!(zero_retries.validate().is_err());
    }

    #[test]
    fn test_no_climate_section() {
        assert!(parse("homeassistant:\n  name: Home\n").unwrap().is_empty());
        assert!(matches!(
            parse("climate: 3\n").unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_debug_redacts_local_key() {
        let configs = parse(&format!(
            "climate:\n  platform: localtuya\n  host: h\n  device_id: d\n  local_key: {KEY}\n"
        ))
        .unwrap();
        assert!(!format!("{:?}", configs[0]).contains(KEY));
    }

    #[test]
    fn test_load_from_directory_with_secret() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.yaml"), format!("hall_key: {KEY}\n")).unwrap();
        fs::write(
            dir.path().join("configuration.yaml"),
            "climate:\n  - platform: localtuya\n    host: 10.0.0.3\n    device_id: bf03\n    local_key: !secret hall_key\n",
        )
        .unwrap();

        let configs = load_platform_configs(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(configs[0].local_key, KEY);
    }
}
