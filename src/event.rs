use std::collections::BTreeMap;
use std::fmt;

use geo::Geometry;

/// Stable identifier of a hazard event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(String);

impl EventId {
    /// Creates an event identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A hazard event as seen by this crate: an identifier, one geometry, and
/// attributes that are carried along untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardEvent {
    /// The event identifier.
    pub id: EventId,
    /// The event geometry: a bare polygon or a heterogeneous collection.
    pub geometry: Geometry<f64>,
    /// Opaque attributes owned by the host application.
    pub attributes: BTreeMap<String, String>,
}

impl HazardEvent {
    /// Creates an event with no attributes.
    #[must_use]
    pub fn new(id: impl Into<EventId>, geometry: Geometry<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute, returning the updated event.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this event carrying `geometry` instead of its own.
    #[must_use]
    pub fn with_geometry(&self, geometry: Geometry<f64>) -> Self {
        Self {
            id: self.id.clone(),
            geometry,
            attributes: self.attributes.clone(),
        }
    }
}
