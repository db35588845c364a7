//! YAML loader with `!include`, `!secret` and `!env_var` support

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader bound to a configuration directory
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, for circular include detection
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Create a loader, reading `secrets.yaml` from the config directory if present
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    result.insert(k, self.process_value(v, source_path)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<Value>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}' with value {:?}", tag, tagged.value);

        match tag.as_str() {
            "!include" => {
                let include_path = self.include_path(&tagged.value, source_path)?;
                if !include_path.exists() {
                    return Err(ConfigError::IncludeNotFound { path: include_path });
                }
                debug!("Including file: {:?}", include_path);
                self.load_file(&include_path)
            }
            "!secret" => {
                let key = expect_string(tagged.value, "!secret")?;
                let secret = self.secrets.get(&key)?;
                debug!("Substituted secret: {}", key);
                Ok(Value::String(secret.to_string()))
            }
            "!env_var" => self.process_env_var(tagged.value),
            _ => {
                // Unknown tag, keep it but process the inner value
                let value = self.process_value(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }

    /// `!env_var NAME` or `!env_var NAME default`
    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let spec = expect_string(value, "!env_var")?;
        let (var_name, default) = match spec.split_once(char::is_whitespace) {
            Some((name, default)) => (name.to_string(), Some(default.trim().to_string())),
            None => (spec, None),
        };

        match (std::env::var(&var_name), default) {
            (Ok(env_value), _) => {
                debug!("Substituted env var: {}", var_name);
                Ok(Value::String(env_value))
            }
            (Err(_), Some(default)) => {
                debug!("Env var {} not set, using default", var_name);
                Ok(Value::String(default))
            }
            (Err(_), None) => Err(ConfigError::EnvVarNotFound { var: var_name }),
        }
    }

    /// Resolve an include target relative to the including file
    fn include_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = match value {
            Value::String(s) => s,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "!include".to_string(),
                    reason: "path must be a string".to_string(),
                })
            }
        };

        let path = Path::new(path_str);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let base_dir = source_path.parent().unwrap_or(&self.config_dir);
        Ok(base_dir.join(path))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn expect_string(value: Value, tag: &str) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ConfigError::InvalidValue {
            key: tag.to_string(),
            reason: format!("expected a string, got {:?}", other),
        }),
    }
}

/// Load a YAML file with full tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir)?;
    loader.load_file(file)
}

/// Load a YAML string with tag processing
pub fn load_yaml_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir)?;
    let source = loader.config_dir().join(source_name);
    loader.load_string(content, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_secret_substitution() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "secrets.yaml", "hall_key: 0123456789abcdef\n");
        write_file(dir.path(), "configuration.yaml", "local_key: !secret hall_key\n");

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(value["local_key"].as_str(), Some("0123456789abcdef"));
    }

    #[test]
    fn test_missing_secret() {
        let dir = TempDir::new().unwrap();
        let result = load_yaml_string(dir.path(), "key: !secret nope\n", "configuration.yaml");
        assert!(matches!(result, Err(ConfigError::SecretNotFound { key }) if key == "nope"));
    }

    #[test]
    fn test_include_relative_to_source() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "configuration.yaml", "climate: !include climate.yaml\n");
        write_file(dir.path(), "climate.yaml", "- platform: localtuya\n  host: 10.0.0.2\n");

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        let climate = value["climate"].as_sequence().unwrap();
        assert_eq!(climate[0]["host"].as_str(), Some("10.0.0.2"));
    }

    #[test]
    fn test_missing_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "configuration.yaml", "climate: !include gone.yaml\n");
        let result = load_yaml(dir.path(), "configuration.yaml");
        assert!(matches!(result, Err(ConfigError::IncludeNotFound { .. })));
    }

    #[test]
    fn test_circular_include() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "a: !include a.yaml\n");

        let result = load_yaml(dir.path(), "a.yaml");
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_env_var_with_default() {
        let dir = TempDir::new().unwrap();
        let value = load_yaml_string(
            dir.path(),
            "host: !env_var LOCALTUYA_TEST_SURELY_UNSET_HOST 10.0.0.9\n",
            "configuration.yaml",
        )
        .unwrap();
        assert_eq!(value["host"].as_str(), Some("10.0.0.9"));
    }

    #[test]
    fn test_env_var_missing() {
        let dir = TempDir::new().unwrap();
        let result = load_yaml_string(
            dir.path(),
            "host: !env_var LOCALTUYA_TEST_SURELY_UNSET_HOST\n",
            "configuration.yaml",
        );
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound { .. })));
    }

    #[test]
    fn test_unknown_tag_preserved() {
        let dir = TempDir::new().unwrap();
        let value =
            load_yaml_string(dir.path(), "x: !custom thing\n", "configuration.yaml").unwrap();
        assert!(matches!(value["x"], Value::Tagged(_)));
    }
}
