use std::fmt;

use crate::entity::SpatialEntity;
use crate::event::HazardEvent;

/// One of the four contiguous z-order partitions of the entity list, in
/// draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    Hatching,
    Unselected,
    Selected,
    Tool,
}

impl Band {
    /// All bands in draw order.
    pub const ALL: [Self; 4] = [Self::Hatching, Self::Unselected, Self::Selected, Self::Tool];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Hatching => "hatching",
            Self::Unselected => "unselected",
            Self::Selected => "selected",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The entities one event contributes, grouped by band.
///
/// At most one of `unselected` and `selected` may be non-empty, since an
/// event is either selected or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventEntities {
    pub hatching: Vec<SpatialEntity>,
    pub unselected: Vec<SpatialEntity>,
    pub selected: Vec<SpatialEntity>,
}

impl EventEntities {
    /// Entities of an event that is not selected.
    #[must_use]
    pub fn unselected(hatching: Vec<SpatialEntity>, entities: Vec<SpatialEntity>) -> Self {
        Self {
            hatching,
            unselected: entities,
            selected: Vec::new(),
        }
    }

    /// Entities of a selected event.
    #[must_use]
    pub fn selected(hatching: Vec<SpatialEntity>, entities: Vec<SpatialEntity>) -> Self {
        Self {
            hatching,
            unselected: Vec::new(),
            selected: entities,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hatching.is_empty() && self.unselected.is_empty() && self.selected.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hatching.len() + self.unselected.len() + self.selected.len()
    }

    /// The band holding this event's non-hatching entities, if any.
    #[must_use]
    pub fn primary_band(&self) -> Option<Band> {
        if !self.selected.is_empty() {
            Some(Band::Selected)
        } else if !self.unselected.is_empty() {
            Some(Band::Unselected)
        } else {
            None
        }
    }

    pub(crate) fn groups(&self) -> [(Band, &[SpatialEntity]); 3] {
        [
            (Band::Hatching, self.hatching.as_slice()),
            (Band::Unselected, self.unselected.as_slice()),
            (Band::Selected, self.selected.as_slice()),
        ]
    }
}

/// Turns a hazard event into the spatial entities that display it.
///
/// Implemented by the host, which knows the current selection, time window,
/// and per-hazard-type styling.
pub trait EntityBuilder {
    /// Builds the entities for `event`. May return nothing.
    fn build_entities(&self, event: &HazardEvent) -> EventEntities;
}
