//! localtuya climate simulator
//!
//! Loads `configuration.yaml` from the directory given as first argument
//! (default: current directory), creates one climate entity per
//! `platform: localtuya` entry, each backed by an in-memory thermostat, and
//! polls them until interrupted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tuya_climate::{
    setup_platform, spawn_polling, ClimateDefaults, ClimateEntity, TuyaClimate,
    DEFAULT_SCAN_INTERVAL,
};
use tuya_config::load_platform_configs;
use tuya_core::{channels, DpsValue, EntityId, EntityState, RawStatus};
use tuya_device::SimulatedThermostat;

const CONFIG_FILE: &str = "configuration.yaml";

/// Last published state of every entity
///
/// Publishing keeps `last_changed` from the previous state when the state
/// value did not change, whichever path the update came from.
#[derive(Clone, Default)]
pub struct StateBoard {
    states: Arc<RwLock<HashMap<EntityId, EntityState>>>,
}

impl StateBoard {
    pub fn get(&self, entity_id: &EntityId) -> Option<EntityState> {
        self.states.read().unwrap().get(entity_id).cloned()
    }

    /// Store and log a state built elsewhere, e.g. by the polling task
    pub fn record(&self, state: EntityState) -> EntityState {
        let mut states = self.states.write().unwrap();
        let state = match states.get(&state.entity_id) {
            Some(previous) => previous.with_update(state.state, state.attributes),
            None => state,
        };
        log_state(&state);
        states.insert(state.entity_id.clone(), state.clone());
        state
    }

    /// Build the entity's state on top of the last published one
    pub fn publish(&self, entity: &dyn ClimateEntity) -> EntityState {
        let previous = self.get(entity.entity_id());
        self.record(entity.entity_state(previous.as_ref()))
    }
}

/// Running climate entities and their background tasks
pub struct LocalTuya {
    pub entities: HashMap<EntityId, Arc<TuyaClimate>>,
    pub states: StateBoard,
    tasks: Vec<JoinHandle<()>>,
}

impl LocalTuya {
    /// Set up every configured thermostat and start polling it
    pub async fn start(config_dir: &Path) -> Result<Self> {
        let configs = load_platform_configs(config_dir, CONFIG_FILE)
            .with_context(|| format!("loading {}", config_dir.join(CONFIG_FILE).display()))?;

        let (update_tx, update_rx) = mpsc::unbounded_channel::<EntityId>();
        let scheduler = Arc::new(update_tx);

        let states = StateBoard::default();
        let mut entities = HashMap::new();
        let mut tasks = Vec::new();
        for config in &configs {
            let device = SimulatedThermostat::new(initial_status(&config.device_id));
            let climate = match setup_platform(
                config,
                device,
                ClimateDefaults::default(),
                scheduler.clone(),
            )
            .await
            {
                Ok(climate) => Arc::new(climate),
                Err(err) => {
                    warn!(device_id = %config.device_id, error = %err, "Setup failed");
                    continue;
                }
            };

            let board = states.clone();
            tasks.push(spawn_polling(
                climate.clone(),
                DEFAULT_SCAN_INTERVAL,
                move |state| {
                    board.record(state);
                },
            ));
            entities.insert(climate.entity_id().clone(), climate);
        }

        tasks.push(spawn_scheduled_updates(
            entities.clone(),
            states.clone(),
            update_rx,
        ));
        info!(count = entities.len(), "Climate entities running");

        Ok(Self {
            entities,
            states,
            tasks,
        })
    }

    pub fn stop(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Datapoints of a freshly powered-on thermostat in manual mode at 20 °C
fn initial_status(device_id: &str) -> RawStatus {
    RawStatus::new([
        (channels::POWER, DpsValue::Bool(true)),
        (channels::TARGET_TEMPERATURE, DpsValue::Int(40)),
        (channels::CURRENT_TEMPERATURE, DpsValue::Int(38)),
        (channels::MODE, DpsValue::from(channels::MODE_MANUAL)),
        (channels::AWAY, DpsValue::Bool(false)),
    ])
    .with_dev_id(device_id)
}

fn log_state(state: &EntityState) {
    let attributes = serde_json::to_string(&state.attributes).unwrap_or_default();
    info!(entity_id = %state.entity_id, state = %state.state, %attributes, "State");
}

/// Write entity states requested out of band by the entities themselves
fn spawn_scheduled_updates(
    entities: HashMap<EntityId, Arc<TuyaClimate>>,
    states: StateBoard,
    mut rx: mpsc::UnboundedReceiver<EntityId>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(entity_id) = rx.recv().await {
            match entities.get(&entity_id) {
                Some(entity) => {
                    states.publish(entity.as_ref());
                }
                None => warn!(%entity_id, "Update requested for unknown entity"),
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    info!(config_dir = %config_dir.display(), "Starting localtuya climate simulator");
    let localtuya = LocalTuya::start(&config_dir).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    localtuya.stop();

    Ok(())
}
