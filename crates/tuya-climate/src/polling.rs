//! Periodic refresh of a climate entity

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};
use tuya_core::EntityState;

use crate::entity::ClimateEntity;

/// Interval between two refreshes when none is configured
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Refresh `entity` every `interval` and publish its state to `sink`
///
/// The current state is published once right away. After that a state is
/// published after every refresh; a failed refresh republishes the previous
/// values. Abort the returned handle to stop polling.
pub fn spawn_polling<E, F>(entity: Arc<E>, interval: Duration, mut sink: F) -> JoinHandle<()>
where
    E: ClimateEntity + ?Sized + 'static,
    F: FnMut(EntityState) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let mut last = entity.entity_state(None);
        sink(last.clone());

        loop {
            ticker.tick().await;
            trace!(entity_id = %entity.entity_id(), "Polling");

            if let Err(err) = entity.refresh().await {
                debug!(entity_id = %entity.entity_id(), error = %err, "Publishing previous state");
            }

            last = entity.entity_state(Some(&last));
            sink(last.clone());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TuyaClimate;
    use tokio::sync::mpsc;
    use tuya_core::{DpsValue, RawStatus};
    use tuya_device::{DeviceSession, LinkError, SimulatedThermostat};

    #[tokio::test]
    async fn test_publishes_after_each_refresh() {
        let device = Arc::new(SimulatedThermostat::new(RawStatus::new([
            ("1", DpsValue::Bool(true)),
            ("2", DpsValue::Int(42)),
            ("3", DpsValue::Int(40)),
            ("4", DpsValue::from("0")),
            ("5", DpsValue::Bool(false)),
        ])));
        let climate = TuyaClimate::builder("Office", DeviceSession::new(device.clone(), 3.3))
            .connect()
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_polling(Arc::new(climate), Duration::from_millis(50), move |state| {
            let _ = tx.send(state);
        });

        let initial = rx.recv().await.unwrap();
        assert_eq!(initial.state, "auto");
        assert_eq!(initial.attribute::<f64>("current_temperature"), Some(20.0));

        device.set_dps("3", 43);
        let refreshed = rx.recv().await.unwrap();
        assert_eq!(refreshed.attribute::<f64>("current_temperature"), Some(21.5));
        assert_eq!(refreshed.last_changed, initial.last_changed);

        device.fail_next_reads(5, LinkError::Connection("timeout".to_string()));
        let stale = rx.recv().await.unwrap();
        assert_eq!(stale, refreshed);

        handle.abort();
    }
}
