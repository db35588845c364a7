//! Error types for the climate entity

use thiserror::Error;
use tuya_core::{DecodeError, EntityIdError};
use tuya_device::SessionError;

/// Failure of a command sent to the thermostat
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A bounded retry policy ran out of attempts
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: SessionError,
    },
}

/// Failure of a refresh; the previous state is kept in either case
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("status read failed: {0}")]
    Session(#[from] SessionError),

    #[error("status decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Failure while setting up an entity from configuration
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid entity name: {0}")]
    EntityId(#[from] EntityIdError),

    #[error("initial status fetch failed: {0}")]
    Session(#[from] SessionError),
}
