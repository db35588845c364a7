//! Raw datapoint payloads returned by a status read

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading typed values out of a `RawStatus`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("channel '{channel}' missing from status payload")]
    MissingChannel { channel: String },

    #[error("channel '{channel}' expected {expected}, got {found}")]
    UnexpectedType {
        channel: String,
        expected: &'static str,
        found: DpsValue,
    },
}

/// A single datapoint value
///
/// The firmware decides the type per channel: booleans for switches,
/// integers for scaled numbers, strings for enumerations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DpsValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl fmt::Display for DpsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpsValue::Bool(b) => write!(f, "{}", b),
            DpsValue::Int(i) => write!(f, "{}", i),
            DpsValue::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for DpsValue {
    fn from(value: bool) -> Self {
        DpsValue::Bool(value)
    }
}

impl From<i32> for DpsValue {
    fn from(value: i32) -> Self {
        DpsValue::Int(i64::from(value))
    }
}

impl From<i64> for DpsValue {
    fn from(value: i64) -> Self {
        DpsValue::Int(value)
    }
}

impl From<&str> for DpsValue {
    fn from(value: &str) -> Self {
        DpsValue::String(value.to_string())
    }
}

impl From<String> for DpsValue {
    fn from(value: String) -> Self {
        DpsValue::String(value)
    }
}

/// The payload of a device status read
///
/// Mirrors the wire shape `{"devId": "...", "dps": {"1": true, "2": 42}}`.
/// Channel keys are vendor-defined strings and are not sequential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatus {
    /// Device id echoed back by the device (not every firmware sends it)
    #[serde(rename = "devId", default, skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<String>,

    /// Channel to value mapping
    #[serde(default)]
    pub dps: HashMap<String, DpsValue>,
}

impl RawStatus {
    /// Create a status payload from channel/value pairs
    pub fn new<K, V>(dps: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<DpsValue>,
    {
        Self {
            dev_id: None,
            dps: dps
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Attach the device id
    pub fn with_dev_id(mut self, dev_id: impl Into<String>) -> Self {
        self.dev_id = Some(dev_id.into());
        self
    }

    /// Raw value of a channel
    pub fn get(&self, channel: &str) -> Option<&DpsValue> {
        self.dps.get(channel)
    }

    /// Set a channel, returning the previous value
    pub fn set(&mut self, channel: impl Into<String>, value: impl Into<DpsValue>) -> Option<DpsValue> {
        self.dps.insert(channel.into(), value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.dps.is_empty()
    }

    /// Read a boolean channel
    pub fn bool(&self, channel: &str) -> Result<bool, DecodeError> {
        match self.require(channel)? {
            DpsValue::Bool(b) => Ok(*b),
            other => Err(unexpected(channel, "bool", other)),
        }
    }

    /// Read an integer channel
    pub fn int(&self, channel: &str) -> Result<i64, DecodeError> {
        match self.require(channel)? {
            DpsValue::Int(i) => Ok(*i),
            other => Err(unexpected(channel, "int", other)),
        }
    }

    /// Read a string channel
    pub fn string(&self, channel: &str) -> Result<&str, DecodeError> {
        match self.require(channel)? {
            DpsValue::String(s) => Ok(s.as_str()),
            other => Err(unexpected(channel, "string", other)),
        }
    }

    fn require(&self, channel: &str) -> Result<&DpsValue, DecodeError> {
        self.dps.get(channel).ok_or_else(|| DecodeError::MissingChannel {
            channel: channel.to_string(),
        })
    }
}

fn unexpected(channel: &str, expected: &'static str, found: &DpsValue) -> DecodeError {
    DecodeError::UnexpectedType {
        channel: channel.to_string(),
        expected,
        found: found.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wire_payload() {
        let status: RawStatus = serde_json::from_value(json!({
            "devId": "bf1234",
            "dps": {"1": true, "2": 43, "3": 40, "4": "1", "5": false}
        }))
        .unwrap();

        assert_eq!(status.dev_id.as_deref(), Some("bf1234"));
        assert_eq!(status.bool("1").unwrap(), true);
        assert_eq!(status.int("2").unwrap(), 43);
        assert_eq!(status.string("4").unwrap(), "1");
        assert_eq!(status.bool("5").unwrap(), false);
    }

    #[test]
    fn test_missing_dev_id_is_accepted() {
        let status: RawStatus = serde_json::from_value(json!({"dps": {"1": false}})).unwrap();
        assert!(status.dev_id.is_none());
        assert!(!status.is_empty());
    }

    #[test]
    fn test_missing_channel() {
        let status = RawStatus::new([("1", true)]);
        assert_eq!(
            status.int("2").unwrap_err(),
            DecodeError::MissingChannel {
                channel: "2".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_type() {
        let status = RawStatus::new([("4", DpsValue::Int(1))]);
        let err = status.string("4").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedType {
                expected: "string",
                ..
            }
        ));
        assert_eq!(err.to_string(), "channel '4' expected string, got 1");
    }

    #[test]
    fn test_set_replaces_value() {
        let mut status = RawStatus::new([("1", false)]);
        let previous = status.set("1", true);
        assert_eq!(previous, Some(DpsValue::Bool(false)));
        assert_eq!(status.get("1"), Some(&DpsValue::Bool(true)));
    }
}
