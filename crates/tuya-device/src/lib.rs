//! Device session for a single Tuya thermostat
//!
//! [`DeviceSession`] is the only path to the device: it owns the
//! [`DeviceLink`], serializes status reads behind a lock, retries reads that
//! fail with a connection error, and drops its cached status on every write.
//!
//! [`SimulatedThermostat`] is an in-memory link with scriptable failures,
//! used by the tests and by the `localtuya-sim` binary.

mod link;
mod session;
mod sim;

pub use link::{Ack, DeviceLink, LinkError};
pub use session::{DeviceSession, SessionError, MAX_STATUS_ATTEMPTS};
pub use sim::SimulatedThermostat;
