//! Entity id for the climate entity (e.g. "climate.living_room")

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::CLIMATE_DOMAIN;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("entity_id part '{0}' must be lowercase alphanumeric with inner underscores")]
    InvalidChars(String),

    #[error("cannot derive an entity_id from '{0}'")]
    EmptySlug(String),
}

/// A `domain.object_id` pair
///
/// Both parts are lowercase ASCII alphanumerics and underscores, and may
/// not start or end with an underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        for part in [&domain, &object_id] {
            if !is_valid_part(part) {
                return Err(EntityIdError::InvalidChars(part.clone()));
            }
        }

        Ok(Self { domain, object_id })
    }

    /// Generate a climate entity id from a display name
    ///
    /// Falls back to `fallback` (typically the device id) when the name
    /// slugifies to nothing.
    pub fn climate_from_name(name: &str, fallback: &str) -> Result<Self, EntityIdError> {
        let slug = match slugify(name) {
            s if s.is_empty() => slugify(fallback),
            s => s,
        };
        if slug.is_empty() {
            return Err(EntityIdError::EmptySlug(name.to_string()));
        }
        Self::new(CLIMATE_DOMAIN, slug)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

fn is_valid_part(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Lowercase, collapse every run of non-alphanumerics into one underscore
fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_sep = false;

    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => Self::new(domain, object_id),
            _ => Err(EntityIdError::InvalidFormat),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        let id = EntityId::climate_from_name("Living Room Thermostat", "dev").unwrap();
        assert_eq!(id.to_string(), "climate.living_room_thermostat");
        assert_eq!(id.domain(), "climate");
    }

    #[test]
    fn test_from_name_collapses_separators() {
        let id = EntityId::climate_from_name("  Bath -- Floor #2 ", "dev").unwrap();
        assert_eq!(id.object_id(), "bath_floor_2");
    }

    #[test]
    fn test_from_name_falls_back_to_device_id() {
        let id = EntityId::climate_from_name("***", "bf12AB34").unwrap();
        assert_eq!(id.object_id(), "bf12ab34");

        assert_eq!(
            EntityId::climate_from_name("", "").unwrap_err(),
            EntityIdError::EmptySlug(String::new())
        );
    }

    #[test]
    fn test_parse() {
        let id: EntityId = "climate.hall".parse().unwrap();
        assert_eq!(id.object_id(), "hall");

        assert_eq!(
            "climate".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "climate.a.b".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert!(matches!(
            "climate._hall".parse::<EntityId>(),
            Err(EntityIdError::InvalidChars(_))
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntityId::new("climate", "office").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"climate.office\"");
    }
}
