use geo::Geometry;

use super::attributes::DisplayAttributes;
use super::identifier::EntityIdentifier;
use crate::event::EventId;
use crate::geometry::is_polygonal;

/// One independently identifiable shape shown on the map.
///
/// Immutable once built. A changed entity is a new `SpatialEntity` that
/// replaces the old one in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEntity {
    identifier: EntityIdentifier,
    geometry: Geometry<f64>,
    attributes: DisplayAttributes,
}

impl SpatialEntity {
    /// Creates an entity with default display attributes.
    #[must_use]
    pub fn new(identifier: EntityIdentifier, geometry: Geometry<f64>) -> Self {
        Self {
            identifier,
            geometry,
            attributes: DisplayAttributes::default(),
        }
    }

    /// Replaces the display attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: DisplayAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn identifier(&self) -> &EntityIdentifier {
        &self.identifier
    }

    #[must_use]
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    #[must_use]
    pub fn attributes(&self) -> &DisplayAttributes {
        &self.attributes
    }

    /// The owning event, or `None` for tool overlay entities.
    #[must_use]
    pub fn event_id(&self) -> Option<&EventId> {
        self.identifier.event_id()
    }

    /// Returns `true` if the geometry is or contains a polygon.
    #[must_use]
    pub fn is_polygonal(&self) -> bool {
        is_polygonal(&self.geometry)
    }
}
