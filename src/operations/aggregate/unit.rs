use std::cmp::Ordering;

use geo::{Centroid, MultiPolygon, Point};
use slotmap::SlotMap;

use crate::error::GeometryError;

slotmap::new_key_type! {
    /// Handle of a working polygon within one aggregation run.
    pub(crate) struct UnitId;
}

/// A working polygon paired with its centroid.
#[derive(Debug, Clone)]
pub(crate) struct AggregationUnit {
    pub centroid: Point<f64>,
    pub geometry: MultiPolygon<f64>,
    /// Creation order, the last tie-break when centroids coincide.
    pub sequence: u64,
}

impl AggregationUnit {
    /// Builds a unit, computing its centroid.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::EmptyResult` if the geometry has no centroid.
    pub fn new(geometry: MultiPolygon<f64>) -> Result<Self, GeometryError> {
        let centroid = geometry
            .centroid()
            .ok_or_else(|| GeometryError::EmptyResult("geometry has no centroid".to_owned()))?;
        Ok(Self {
            centroid,
            geometry,
            sequence: 0,
        })
    }

    fn order_key(&self, other: &Self) -> Ordering {
        self.centroid
            .x()
            .total_cmp(&other.centroid.x())
            .then_with(|| self.centroid.y().total_cmp(&other.centroid.y()))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// Arena owning the live units of one aggregation run.
///
/// Units are keyed by handle, never by centroid value, so centroid drift
/// across merges cannot alias two units.
#[derive(Debug, Default)]
pub(crate) struct UnitArena {
    units: SlotMap<UnitId, AggregationUnit>,
    next_sequence: u64,
}

impl UnitArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut unit: AggregationUnit) -> UnitId {
        unit.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.units.insert(unit)
    }

    pub fn remove(&mut self, id: UnitId) -> Option<AggregationUnit> {
        self.units.remove(id)
    }

    pub fn get(&self, id: UnitId) -> Option<&AggregationUnit> {
        self.units.get(id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Live handles sorted by centroid x, then y, then creation order.
    pub fn ordered_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.units.keys().collect();
        ids.sort_by(|&a, &b| self.units[a].order_key(&self.units[b]));
        ids
    }

    /// Consumes the arena, yielding geometries in deterministic order.
    pub fn into_geometries(mut self) -> Vec<MultiPolygon<f64>> {
        self.ordered_ids()
            .into_iter()
            .filter_map(|id| self.units.remove(id))
            .map(|unit| unit.geometry)
            .collect()
    }
}
