//! Framework-facing snapshot of an entity's state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// State of an entity as written to the framework's state machine
///
/// The state value is a string (for a climate entity, the hvac mode) and
/// everything else travels as attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: EntityId,

    /// The state value (e.g. "heat", "off")
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if nothing changed
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
        }
    }

    /// Build the next snapshot, keeping `last_changed` if the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
        }
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for EntityState {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hall() -> EntityId {
        EntityId::new("climate", "hall").unwrap()
    }

    #[test]
    fn test_update_keeps_last_changed_for_same_value() {
        let first = EntityState::new(hall(), "heat", HashMap::new());
        let second = first.with_update(
            "heat",
            HashMap::from([("temperature".to_string(), json!(21.5))]),
        );

        assert_eq!(second.last_changed, first.last_changed);
        assert!(second.last_updated >= first.last_updated);
        assert_eq!(second.attribute::<f64>("temperature"), Some(21.5));
    }

    #[test]
    fn test_update_moves_last_changed_on_new_value() {
        let first = EntityState::new(hall(), "heat", HashMap::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = first.with_update("off", HashMap::new());

        assert!(second.last_changed > first.last_changed);
        assert_ne!(first, second);
    }
}
