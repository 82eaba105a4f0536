use std::collections::HashSet;
use std::sync::Arc;

use crate::entity::{EntityIdentifier, SpatialEntity};

/// Immutable copy of the index's draw list, handed to the renderer.
///
/// Entities are shared, not cloned, so taking a snapshot is cheap. Later
/// changes to the index never show through an existing snapshot, which makes
/// it safe to draw on another thread or a later turn of an event loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawSnapshot {
    entities: Vec<Arc<SpatialEntity>>,
    selected: HashSet<EntityIdentifier>,
}

impl DrawSnapshot {
    pub(crate) fn new(entities: Vec<Arc<SpatialEntity>>, selected: HashSet<EntityIdentifier>) -> Self {
        Self { entities, selected }
    }

    /// Entities in draw order.
    #[must_use]
    pub fn entities(&self) -> &[Arc<SpatialEntity>] {
        &self.entities
    }

    /// Identifiers of the currently selected entities.
    #[must_use]
    pub fn selected(&self) -> &HashSet<EntityIdentifier> {
        &self.selected
    }

    #[must_use]
    pub fn is_selected(&self, identifier: &EntityIdentifier) -> bool {
        self.selected.contains(identifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// The rendering collaborator: receives a fresh snapshot whenever the index
/// changes.
pub trait EntityRenderer {
    fn draw(&mut self, snapshot: DrawSnapshot);
}
