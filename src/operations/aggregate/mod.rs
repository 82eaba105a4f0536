mod pass;
mod unit;

use geo::{Geometry, GeometryCollection, MultiPolygon};
use tracing::{debug, warn};

use self::pass::{run_to_fixed_point, MergePass};
use self::unit::{AggregationUnit, UnitArena};
use super::config::AggregationConfig;
use super::dehole::{dehole_geometry, simplify_multi};
use crate::event::HazardEvent;
use crate::geometry::{flatten_polygons, non_polygonal_parts, validate_polygon};

/// Merges the intersecting or nearby polygons of one event geometry into
/// composite polygons, then prunes thin holes from the result.
///
/// # Algorithm
///
/// 1. **Flatten**: split multi-polygons and collections into simple polygons;
///    malformed polygons are logged and dropped.
/// 2. **Intersection pass**: union intersecting pairs until nothing changes.
/// 3. **Distance pass**: union pairs closer than the distance threshold until
///    nothing changes.
/// 4. **Dehole**: prune holes from every resulting polygon.
///
/// A bare polygon input is returned unchanged.
#[derive(Debug)]
pub struct Aggregate {
    geometry: Geometry<f64>,
    config: AggregationConfig,
}

impl Aggregate {
    /// Creates an aggregation of `geometry` with default thresholds.
    #[must_use]
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            config: AggregationConfig::default(),
        }
    }

    /// Overrides the thresholds.
    #[must_use]
    pub fn with_config(mut self, config: AggregationConfig) -> Self {
        self.config = config;
        self
    }

    /// Executes the aggregation.
    ///
    /// Each returned geometry is a polygon, or a multi-polygon when the
    /// distance pass joined parts that do not touch. Order is by centroid.
    #[must_use]
    pub fn execute(&self) -> Vec<Geometry<f64>> {
        if let Geometry::Polygon(polygon) = &self.geometry {
            return vec![Geometry::Polygon(polygon.clone())];
        }

        let mut arena = UnitArena::new();
        for polygon in flatten_polygons(&self.geometry) {
            if let Err(err) = validate_polygon(&polygon) {
                warn!(error = %err, "excluding malformed polygon from aggregation");
                continue;
            }
            match AggregationUnit::new(MultiPolygon::new(vec![polygon])) {
                Ok(unit) => {
                    arena.insert(unit);
                }
                Err(err) => warn!(error = %err, "excluding polygon without centroid"),
            }
        }
        if arena.is_empty() {
            return Vec::new();
        }

        let input = arena.len();
        run_to_fixed_point(&mut arena, MergePass::Intersection, &self.config);
        run_to_fixed_point(&mut arena, MergePass::Distance, &self.config);
        debug!(input, output = arena.len(), "aggregated polygons");

        arena
            .into_geometries()
            .into_iter()
            .map(|multi| dehole_geometry(&simplify_multi(multi), &self.config))
            .collect()
    }
}

/// Aggregates the geometry of every event, returning new events that carry
/// the merged geometry.
///
/// A single aggregated geometry replaces the event geometry directly; several
/// are wrapped in a geometry collection together with any points and lines
/// the event carried. An event without usable polygons keeps its geometry.
#[must_use]
pub fn aggregate_events(events: &[HazardEvent], config: &AggregationConfig) -> Vec<HazardEvent> {
    events
        .iter()
        .map(|event| {
            let mut merged = Aggregate::new(event.geometry.clone())
                .with_config(*config)
                .execute();
            if merged.is_empty() {
                debug!(event = %event.id, "no polygons to aggregate, geometry kept");
                return event.clone();
            }
            merged.extend(non_polygonal_parts(&event.geometry));
            let geometry = if merged.len() == 1 {
                merged.remove(0)
            } else {
                Geometry::GeometryCollection(GeometryCollection(merged))
            };
            event.with_geometry(geometry)
        })
        .collect()
}
