use crate::event::EventId;

/// Kind of tool that owns a set of overlay entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolType {
    /// A recommender producing candidate hazard areas.
    Recommender,
    /// An interactive tool collecting user input on the map.
    Interactive,
}

/// Value-typed key uniquely naming a spatial entity.
///
/// Equality and hashing are structural; identifiers of different variants
/// never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityIdentifier {
    /// Hatching of one sub-area (county, zone) affected by an event.
    Hatching {
        event_id: EventId,
        sub_area_key: String,
    },
    /// The event's own geometry, when it has no visual features.
    EventGeometry { event_id: EventId },
    /// One visual feature of an event.
    EventVisualFeature { event_id: EventId, feature_id: String },
    /// One visual feature of a running tool.
    ToolVisualFeature {
        tool_type: ToolType,
        tool_id: String,
        feature_id: String,
    },
}

impl EntityIdentifier {
    /// Identifier for a hatched sub-area of an event.
    #[must_use]
    pub fn hatching(event_id: impl Into<EventId>, sub_area_key: impl Into<String>) -> Self {
        Self::Hatching {
            event_id: event_id.into(),
            sub_area_key: sub_area_key.into(),
        }
    }

    /// Identifier for an event's own geometry.
    #[must_use]
    pub fn event_geometry(event_id: impl Into<EventId>) -> Self {
        Self::EventGeometry {
            event_id: event_id.into(),
        }
    }

    /// Identifier for an event visual feature.
    #[must_use]
    pub fn event_visual_feature(event_id: impl Into<EventId>, feature_id: impl Into<String>) -> Self {
        Self::EventVisualFeature {
            event_id: event_id.into(),
            feature_id: feature_id.into(),
        }
    }

    /// Identifier for a tool visual feature.
    #[must_use]
    pub fn tool_visual_feature(
        tool_type: ToolType,
        tool_id: impl Into<String>,
        feature_id: impl Into<String>,
    ) -> Self {
        Self::ToolVisualFeature {
            tool_type,
            tool_id: tool_id.into(),
            feature_id: feature_id.into(),
        }
    }

    /// The owning event, or `None` for tool features.
    #[must_use]
    pub fn event_id(&self) -> Option<&EventId> {
        match self {
            Self::Hatching { event_id, .. }
            | Self::EventGeometry { event_id }
            | Self::EventVisualFeature { event_id, .. } => Some(event_id),
            Self::ToolVisualFeature { .. } => None,
        }
    }

    /// Returns `true` for hatching identifiers.
    #[must_use]
    pub fn is_hatching(&self) -> bool {
        matches!(self, Self::Hatching { .. })
    }

    /// Returns `true` for tool visual feature identifiers.
    #[must_use]
    pub fn is_tool(&self) -> bool {
        matches!(self, Self::ToolVisualFeature { .. })
    }
}
