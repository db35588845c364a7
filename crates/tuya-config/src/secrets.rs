//! Secrets loaded from `secrets.yaml`
//!
//! Device local keys normally live here rather than in the main file.

use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Secrets store keyed by name
#[derive(Clone, Default)]
pub struct Secrets {
    secrets: HashMap<String, String>,
    path: Option<PathBuf>,
}

impl Secrets {
    /// Load `secrets.yaml` from the config directory; a missing file yields an empty store
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join("secrets.yaml");

        if !path.exists() {
            debug!("No secrets.yaml found at {:?}, using empty secrets", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let raw: HashMap<String, serde_yaml::Value> =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                path: path.clone(),
                source: e,
            })?;

        let mut secrets = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(ConfigError::InvalidValue {
                        key,
                        reason: format!("secret must be a scalar, got {:?}", other),
                    })
                }
            };
            secrets.insert(key, value);
        }

        debug!("Loaded {} secrets from {:?}", secrets.len(), path);

        Ok(Self {
            secrets,
            path: Some(path),
        })
    }

    /// Build a store from in-memory pairs
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            secrets: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            path: None,
        }
    }

    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.secrets
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }

    /// Path of the file the secrets came from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.secrets.keys().collect();
        keys.sort();
        f.debug_struct("Secrets")
            .field("keys", &keys)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_scalars() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "hall_key: 0123456789abcdef\nport: 6668\nenabled: true\n",
        )
        .unwrap();

        let secrets = Secrets::load(dir.path()).unwrap();
        assert_eq!(secrets.get("hall_key").unwrap(), "0123456789abcdef");
        assert_eq!(secrets.get("port").unwrap(), "6668");
        assert_eq!(secrets.get("enabled").unwrap(), "true");
        assert_eq!(secrets.len(), 3);
        assert!(secrets.path().is_some());
    }

    #[test]
    fn test_rejects_nested_values() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.yaml"), "nested:\n  a: 1\n").unwrap();

        let result = Secrets::load(dir.path());
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "nested"));
    }

    #[test]
    fn test_no_secrets_file() {
        let dir = TempDir::new().unwrap();
        let secrets = Secrets::load(dir.path()).unwrap();
        assert!(secrets.is_empty());
        assert!(secrets.path().is_none());
    }

    #[test]
    fn test_debug_hides_values() {
        let secrets = Secrets::from_pairs([("hall_key", "0123456789abcdef")]);
        let rendered = format!("{:?}", secrets);
        assert!(rendered.contains("hall_key"));
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(secrets.contains("hall_key"));
    }
}
