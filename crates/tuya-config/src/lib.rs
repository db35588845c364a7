//! Platform configuration for the localtuya climate adapter
//!
//! Configuration lives in `configuration.yaml` under the `climate:` key, as
//! one mapping or a list of platform mappings:
//!
//! ```yaml
//! climate:
//!   - platform: localtuya
//!     name: Hallway
//!     host: 192.168.1.40
//!     device_id: bf0123456789abcdef
//!     local_key: !secret hallway_key
//!     min_temp: 5
//!     max_temp: 30
//!     protocol_version: 3.3
//! ```
//!
//! Supported YAML tags:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution

mod error;
mod loader;
mod platform;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use platform::{
    load_platform_configs, platform_configs_from_value, TuyaClimateConfig,
    DEFAULT_PROTOCOL_VERSION, PLATFORM, SUPPORTED_PROTOCOL_VERSIONS,
};
pub use secrets::Secrets;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
