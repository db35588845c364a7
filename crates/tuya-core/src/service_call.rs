//! Service call type for commands sent to the climate entity

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A call to a service such as `climate.set_temperature`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    /// Domain the service belongs to (e.g. "climate")
    pub domain: String,

    /// Service name (e.g. "set_hvac_mode")
    pub service: String,

    /// Data passed to the service (entity_id, temperature, hvac_mode, ...)
    pub service_data: serde_json::Value,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }

    /// Full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Deserialize the service data into a typed payload
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.service_data.clone())
    }

    /// Entity ids targeted by the call, accepting a string or a list
    pub fn entity_ids(&self) -> Vec<String> {
        match self.service_data.get("entity_id") {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => vec![],
        }
    }

    /// Whether the call addresses `entity_id`
    ///
    /// A call without any `entity_id` targets every entity of the domain.
    pub fn targets(&self, entity_id: &EntityId) -> bool {
        let ids = self.entity_ids();
        ids.is_empty() || ids.iter().any(|id| *id == entity_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Temperature {
        temperature: f64,
    }

    #[test]
    fn test_typed_data() {
        let call = ServiceCall::new(
            "climate",
            "set_temperature",
            json!({"entity_id": "climate.hall", "temperature": 20.5}),
        );
        assert_eq!(call.service_id(), "climate.set_temperature");
        assert_eq!(call.data::<Temperature>().unwrap().temperature, 20.5);
    }

    #[test]
    fn test_targets() {
        let hall = EntityId::new("climate", "hall").unwrap();
        let attic = EntityId::new("climate", "attic").unwrap();

        let single = ServiceCall::new("climate", "turn_on", json!({"entity_id": "climate.hall"}));
        assert!(single.targets(&hall));
        assert!(!single.targets(&attic));

        let list = ServiceCall::new(
            "climate",
            "turn_on",
            json!({"entity_id": ["climate.attic", "climate.hall"]}),
        );
        assert!(list.targets(&hall));
        assert!(list.targets(&attic));

        let broadcast = ServiceCall::new("climate", "turn_off", json!({}));
        assert!(broadcast.targets(&attic));
    }
}
