//! Serialized access to one device link

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use tuya_core::{DpsValue, RawStatus};

use crate::link::{Ack, DeviceLink, LinkError};

/// Status reads give up after this many consecutive connection failures
pub const MAX_STATUS_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("device unreachable after {attempts} attempts: {source}")]
    DeviceUnreachable {
        attempts: u32,
        #[source]
        source: LinkError,
    },

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl SessionError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, SessionError::DeviceUnreachable { .. })
    }
}

/// Last fetched status; an epoch timestamp means empty
#[derive(Debug, Default)]
struct SessionCache {
    status: RawStatus,
    fetched_at: DateTime<Utc>,
}

impl SessionCache {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn is_empty(&self) -> bool {
        self.fetched_at == DateTime::<Utc>::default()
    }
}

/// Owns the device link for its whole lifetime
///
/// Status reads hold the session lock across all retry attempts. Writes do
/// not take it: the caller serializes command sequences with its own lock so
/// several writes can share one critical section.
///
/// The cache is bookkeeping only. Reads always go to the device.
pub struct DeviceSession {
    link: Box<dyn DeviceLink>,
    protocol_version: f32,
    lock: Mutex<()>,
    cache: RwLock<SessionCache>,
}

impl DeviceSession {
    pub fn new(link: impl DeviceLink + 'static, protocol_version: f32) -> Self {
        Self {
            link: Box::new(link),
            protocol_version,
            lock: Mutex::new(()),
            cache: RwLock::new(SessionCache::default()),
        }
    }

    pub fn protocol_version(&self) -> f32 {
        self.protocol_version
    }

    /// Read the device status
    ///
    /// Connection failures are retried up to [`MAX_STATUS_ATTEMPTS`] times in
    /// total; any other error is returned after the first attempt.
    #[instrument(skip(self), fields(version = self.protocol_version))]
    pub async fn status(&self) -> Result<RawStatus, SessionError> {
        let _guard = self.lock.lock().await;
        debug!("Updating status");

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.link.set_version(self.protocol_version);

            match self.link.status().await {
                Ok(status) => {
                    debug!(attempt, ?status, "Status read");
                    self.store(&status);
                    return Ok(status);
                }
                Err(err) if err.is_connection() && attempt < MAX_STATUS_ATTEMPTS => {
                    debug!(attempt, error = %err, "Status read failed, retrying");
                }
                Err(err) if err.is_connection() => {
                    warn!(attempts = attempt, error = %err, "Failed to update status");
                    return Err(SessionError::DeviceUnreachable {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Write one datapoint, invalidating the cached status first
    #[instrument(skip(self, value))]
    pub async fn write(
        &self,
        value: impl Into<DpsValue>,
        channel: &str,
    ) -> Result<Ack, SessionError> {
        let value = value.into();
        self.invalidate();
        debug!(%value, "Writing datapoint");
        Ok(self.link.set_status(value, channel).await?)
    }

    /// Last status read and when it was fetched, unless a write cleared it
    pub fn cached(&self) -> Option<(RawStatus, DateTime<Utc>)> {
        let cache = self.cache.read().unwrap();
        if cache.is_empty() {
            return None;
        }
        Some((cache.status.clone(), cache.fetched_at))
    }

    fn store(&self, status: &RawStatus) {
        let mut cache = self.cache.write().unwrap();
        cache.status = status.clone();
        cache.fetched_at = Utc::now();
    }

    fn invalidate(&self) {
        self.cache.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedThermostat;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn thermostat() -> Arc<SimulatedThermostat> {
        Arc::new(SimulatedThermostat::new(RawStatus::new([
            ("1", DpsValue::Bool(true)),
            ("2", DpsValue::Int(42)),
        ])))
    }

    fn connection_error() -> LinkError {
        LinkError::Connection("timed out".to_string())
    }

    #[tokio::test]
    async fn test_status_sets_version_and_caches() {
        let device = thermostat();
        let session = DeviceSession::new(device.clone(), 3.3);

        let status = assert_ok!(session.status().await);
        assert_eq!(status.int("2").unwrap(), 42);
        assert_eq!(device.version(), Some(3.3));
        assert_eq!(device.reads(), 1);

        let (cached, fetched_at) = session.cached().unwrap();
        assert_eq!(cached, status);
        assert!(fetched_at > DateTime::<Utc>::default());
    }

    #[tokio::test]
    async fn test_four_failures_then_success() {
        let device = thermostat();
        device.fail_next_reads(4, connection_error());
        let session = DeviceSession::new(device.clone(), 3.3);

        assert_ok!(session.status().await);
        assert_eq!(device.reads(), 5);
    }

    #[tokio::test]
    async fn test_five_failures_unreachable() {
        let device = thermostat();
        device.fail_next_reads(5, connection_error());
        let session = DeviceSession::new(device.clone(), 3.3);

        let err = assert_err!(session.status().await);
        assert!(err.is_unreachable());
        assert!(matches!(
            err,
            SessionError::DeviceUnreachable { attempts: 5, .. }
        ));
        assert_eq!(device.reads(), 5);
        assert!(session.cached().is_none());
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let device = thermostat();
        device.fail_next_reads(1, LinkError::Protocol("bad crc".to_string()));
        let session = DeviceSession::new(device.clone(), 3.1);

        let err = assert_err!(session.status().await);
        assert!(matches!(err, SessionError::Link(LinkError::Protocol(_))));
        assert_eq!(device.reads(), 1);

        // The scripted failure is used up
        assert_ok!(session.status().await);
    }

    #[tokio::test]
    async fn test_write_invalidates_cache() {
        let device = thermostat();
        let session = DeviceSession::new(device.clone(), 3.3);

        assert_ok!(session.status().await);
        assert!(session.cached().is_some());

        assert_ok!(session.write(false, "1").await);
        assert!(session.cached().is_none());

        let status = assert_ok!(session.status().await);
        assert_eq!(device.reads(), 2);
        assert_eq!(status.bool("1").unwrap(), false);
    }

    #[tokio::test]
    async fn test_read_after_write_retries_fresh() {
        let device = thermostat();
        let session = DeviceSession::new(device.clone(), 3.3);

        assert_ok!(session.status().await);
        assert_ok!(session.write(44, "2").await);

        device.fail_next_reads(2, connection_error());
        assert_ok!(session.status().await);
        // One read before the write, then three attempts after it
        assert_eq!(device.reads(), 4);
    }

    #[tokio::test]
    async fn test_write_failure_propagates_and_still_invalidates() {
        let device = thermostat();
        let session = DeviceSession::new(device.clone(), 3.3);
        assert_ok!(session.status().await);

        device.fail_next_writes(1, connection_error());
        let err = assert_err!(session.write(true, "1").await);
        assert!(matches!(err, SessionError::Link(LinkError::Connection(_))));
        assert!(session.cached().is_none());
        assert!(device.writes().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_reads_are_serialized() {
        let device = Arc::new(
            SimulatedThermostat::new(RawStatus::new([("1", true)]))
                .with_latency(std::time::Duration::from_millis(5)),
        );
        let session = Arc::new(DeviceSession::new(device.clone(), 3.3));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.status().await })
            })
            .collect();
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        assert_eq!(device.reads(), 4);
        assert_eq!(device.max_concurrent_reads(), 1);
    }
}
