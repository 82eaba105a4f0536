use geo::{BooleanOps, Buffer, Geometry, GeometryCollection, MultiPolygon, Polygon};
use tracing::trace;

use super::config::AggregationConfig;

/// Result of a [`Dehole`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeholeOutcome {
    /// The pruned geometry. Usually a single polygon.
    pub geometry: MultiPolygon<f64>,
    /// Number of pruning rounds that ran (zero if the input had no holes).
    pub iterations: usize,
}

impl DeholeOutcome {
    /// Total interior ring count of the pruned geometry.
    #[must_use]
    pub fn remaining_holes(&self) -> usize {
        interior_count(&self.geometry)
    }
}

/// Removes thin interior rings from a polygon.
///
/// Each round unions the polygon with a narrow buffer around every interior
/// ring, which fills holes narrower than twice the buffer radius and shrinks
/// the rest. Rounds stop once no holes remain or the round limit is reached,
/// so large holes may survive.
#[derive(Debug)]
pub struct Dehole {
    polygon: Polygon<f64>,
    buffer_radius: f64,
    max_iterations: usize,
}

impl Dehole {
    /// Creates a dehole operation using the default thresholds.
    #[must_use]
    pub fn new(polygon: Polygon<f64>) -> Self {
        let config = AggregationConfig::default();
        Self {
            polygon,
            buffer_radius: config.dehole_buffer_radius,
            max_iterations: config.max_dehole_iterations,
        }
    }

    /// Uses the buffer radius and round limit from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &AggregationConfig) -> Self {
        self.buffer_radius = config.dehole_buffer_radius;
        self.max_iterations = config.max_dehole_iterations;
        self
    }

    /// Executes the pruning rounds.
    #[must_use]
    pub fn execute(&self) -> DeholeOutcome {
        let mut current = MultiPolygon::new(vec![self.polygon.clone()]);
        let mut iterations = 0;

        while iterations < self.max_iterations {
            let holes = interior_count(&current);
            if holes == 0 {
                break;
            }
            iterations += 1;

            let mut grown = current.clone();
            for polygon in &current.0 {
                for ring in polygon.interiors() {
                    let band = ring.buffer(self.buffer_radius);
                    grown = grown.union(&band);
                }
            }

            // An empty union means the engine gave up; keep what we had.
            if grown.0.is_empty() {
                break;
            }
            trace!(
                iteration = iterations,
                before = holes,
                after = interior_count(&grown),
                "dehole round"
            );
            current = grown;
        }

        DeholeOutcome {
            geometry: current,
            iterations,
        }
    }
}

/// Prunes holes from every polygon inside `geometry`, recursing into
/// multi-polygons and collections. Non-polygonal parts are returned as-is.
#[must_use]
pub fn dehole_geometry(geometry: &Geometry<f64>, config: &AggregationConfig) -> Geometry<f64> {
    match geometry {
        Geometry::Polygon(polygon) => {
            let outcome = Dehole::new(polygon.clone()).with_config(config).execute();
            simplify_multi(outcome.geometry)
        }
        Geometry::MultiPolygon(multi) => {
            let parts = multi
                .0
                .iter()
                .flat_map(|polygon| Dehole::new(polygon.clone()).with_config(config).execute().geometry)
                .collect();
            Geometry::MultiPolygon(MultiPolygon::new(parts))
        }
        Geometry::GeometryCollection(collection) => Geometry::GeometryCollection(
            GeometryCollection(
                collection
                    .0
                    .iter()
                    .map(|child| dehole_geometry(child, config))
                    .collect(),
            ),
        ),
        other => other.clone(),
    }
}

/// Collapses a one-part multi-polygon to a plain polygon.
pub(crate) fn simplify_multi(mut multi: MultiPolygon<f64>) -> Geometry<f64> {
    if multi.0.len() == 1 {
        if let Some(polygon) = multi.0.pop() {
            return Geometry::Polygon(polygon);
        }
    }
    Geometry::MultiPolygon(multi)
}

fn interior_count(multi: &MultiPolygon<f64>) -> usize {
    multi.0.iter().map(|p| p.interiors().len()).sum()
}
