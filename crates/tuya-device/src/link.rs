//! The device transport capability

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tuya_core::{DpsValue, RawStatus};

/// Errors surfaced by a device link
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// Socket-level failure; the device may answer on the next try
    #[error("connection to device failed: {0}")]
    Connection(String),

    /// The device answered with something the link could not decode
    #[error("device protocol error: {0}")]
    Protocol(String),

    /// The device refused the command
    #[error("device rejected command: {0}")]
    Rejected(String),
}

impl LinkError {
    /// Whether the failure is transient and worth retrying
    pub fn is_connection(&self) -> bool {
        matches!(self, LinkError::Connection(_))
    }
}

/// Acknowledgement of a datapoint write
///
/// Carries the device's decoded reply when it sent one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ack {
    pub payload: Option<serde_json::Value>,
}

/// Encrypted key-value transport to one device
///
/// Bound to one address and local key at construction. Implementations own
/// the wire format; callers only see datapoints.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Select the protocol version for subsequent requests
    fn set_version(&self, version: f32);

    /// Read every datapoint
    async fn status(&self) -> Result<RawStatus, LinkError>;

    /// Write one datapoint
    async fn set_status(&self, value: DpsValue, channel: &str) -> Result<Ack, LinkError>;
}

#[async_trait]
impl<T: DeviceLink + ?Sized> DeviceLink for Arc<T> {
    fn set_version(&self, version: f32) {
        (**self).set_version(version)
    }

    async fn status(&self) -> Result<RawStatus, LinkError> {
        (**self).status().await
    }

    async fn set_status(&self, value: DpsValue, channel: &str) -> Result<Ack, LinkError> {
        (**self).set_status(value, channel).await
    }
}
