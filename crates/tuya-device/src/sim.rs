//! In-memory thermostat implementing `DeviceLink`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;
use tuya_core::{DpsValue, RawStatus};

use crate::link::{Ack, DeviceLink, LinkError};

#[derive(Default)]
struct SimInner {
    status: RawStatus,
    version: Option<f32>,
    read_failures: VecDeque<LinkError>,
    write_failures: VecDeque<LinkError>,
    reads: usize,
    writes: Vec<(String, DpsValue)>,
}

/// A thermostat that lives in memory
///
/// Writes are applied to its datapoints, so a status read after a write sees
/// the new value. Failures can be queued for upcoming reads or writes.
#[derive(Default)]
pub struct SimulatedThermostat {
    inner: Mutex<SimInner>,
    latency: Duration,
    reads_in_flight: AtomicUsize,
    max_reads_in_flight: AtomicUsize,
}

impl SimulatedThermostat {
    pub fn new(status: RawStatus) -> Self {
        Self {
            inner: Mutex::new(SimInner {
                status,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Delay every request by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `count` status reads with `error`
    pub fn fail_next_reads(&self, count: usize, error: LinkError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .read_failures
            .extend(std::iter::repeat(error).take(count));
    }

    /// Fail the next `count` writes with `error`
    pub fn fail_next_writes(&self, count: usize, error: LinkError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .write_failures
            .extend(std::iter::repeat(error).take(count));
    }

    /// Change a datapoint on the device side, e.g. a new room temperature
    pub fn set_dps(&self, channel: &str, value: impl Into<DpsValue>) {
        self.inner.lock().unwrap().status.set(channel, value);
    }

    /// Current datapoints
    pub fn status_snapshot(&self) -> RawStatus {
        self.inner.lock().unwrap().status.clone()
    }

    /// Protocol version last selected by the session
    pub fn version(&self) -> Option<f32> {
        self.inner.lock().unwrap().version
    }

    /// Number of status reads attempted, failed ones included
    pub fn reads(&self) -> usize {
        self.inner.lock().unwrap().reads
    }

    /// Successful writes in the order the device applied them
    pub fn writes(&self) -> Vec<(String, DpsValue)> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// Highest number of status reads that were in progress at once
    pub fn max_concurrent_reads(&self) -> usize {
        self.max_reads_in_flight.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl DeviceLink for SimulatedThermostat {
    fn set_version(&self, version: f32) {
        self.inner.lock().unwrap().version = Some(version);
    }

    async fn status(&self) -> Result<RawStatus, LinkError> {
        let in_flight = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reads_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        self.delay().await;

        let result = {
            let mut inner = self.inner.lock().unwrap();
            inner.reads += 1;
            match inner.read_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(inner.status.clone()),
            }
        };

        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);
        trace!(ok = result.is_ok(), "Simulated status read");
        result
    }

    async fn set_status(&self, value: DpsValue, channel: &str) -> Result<Ack, LinkError> {
        self.delay().await;

        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.write_failures.pop_front() {
            return Err(err);
        }

        trace!(channel, %value, "Simulated write");
        inner.status.set(channel, value.clone());
        inner.writes.push((channel.to_string(), value));
        Ok(Ack::default())
    }
}
