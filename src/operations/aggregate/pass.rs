use std::collections::HashSet;

use geo::{BooleanOps, Distance, Euclidean, Intersects, MultiPolygon};
use tracing::{debug, warn};

use super::unit::{AggregationUnit, UnitArena, UnitId};
use crate::error::{AggregationError, GeometryError};
use crate::operations::config::AggregationConfig;

/// The criterion deciding whether two units merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergePass {
    /// Merge units whose geometries intersect.
    Intersection,
    /// Merge units closer than the configured distance threshold.
    Distance,
}

impl MergePass {
    pub fn name(self) -> &'static str {
        match self {
            Self::Intersection => "intersection",
            Self::Distance => "distance",
        }
    }

    fn qualifies(
        self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
        config: &AggregationConfig,
    ) -> bool {
        match self {
            Self::Intersection => a
                .0
                .iter()
                .any(|p| b.0.iter().any(|q| p.intersects(q))),
            Self::Distance => min_distance(a, b) < config.distance_threshold,
        }
    }
}

fn min_distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    a.0.iter()
        .flat_map(|p| b.0.iter().map(move |q| Euclidean.distance(p, q)))
        .fold(f64::INFINITY, f64::min)
}

/// Computes the union of two units.
pub(crate) type UnionFn =
    fn(&MultiPolygon<f64>, &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError>;

/// Unions two units and repairs the result into a valid multi-polygon.
pub(crate) fn union_pair(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    let merged = a.union(b);
    if merged.0.is_empty() {
        return Err(GeometryError::EmptyResult("union of two polygons".to_owned()));
    }
    let finite = merged
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .flat_map(|ring| ring.0.iter())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite {
        return Err(GeometryError::NonFinite);
    }
    Ok(merged)
}

/// Runs one generation of `pass`: picks disjoint qualifying pairs from a
/// read-only snapshot, computes all unions, then swaps them in.
///
/// Units are visited in centroid order. Each unit pairs with the first later
/// unit that qualifies. Returns the number of merges performed; on error the
/// arena is left unchanged.
pub(crate) fn merge_generation(
    arena: &mut UnitArena,
    pass: MergePass,
    config: &AggregationConfig,
    iteration: usize,
    union: UnionFn,
) -> Result<usize, AggregationError> {
    let order = arena.ordered_ids();
    let mut consumed: HashSet<UnitId> = HashSet::new();
    let mut pairs: Vec<(UnitId, UnitId)> = Vec::new();

    for (i, &a) in order.iter().enumerate() {
        if consumed.contains(&a) {
            continue;
        }
        let Some(unit_a) = arena.get(a) else { continue };
        for &b in &order[i + 1..] {
            if consumed.contains(&b) {
                continue;
            }
            let Some(unit_b) = arena.get(b) else { continue };
            if pass.qualifies(&unit_a.geometry, &unit_b.geometry, config) {
                consumed.insert(a);
                consumed.insert(b);
                pairs.push((a, b));
                break;
            }
        }
    }

    let mut next = Vec::with_capacity(pairs.len());
    for &(a, b) in &pairs {
        let (Some(unit_a), Some(unit_b)) = (arena.get(a), arena.get(b)) else {
            continue;
        };
        let fail = |reason| AggregationError::MergeFailed {
            pass: pass.name(),
            iteration,
            reason,
        };
        let merged = union(&unit_a.geometry, &unit_b.geometry).map_err(fail)?;
        next.push(AggregationUnit::new(merged).map_err(fail)?);
    }

    for &(a, b) in &pairs {
        arena.remove(a);
        arena.remove(b);
    }
    for unit in next {
        arena.insert(unit);
    }
    Ok(pairs.len())
}

/// Repeats `pass` until a generation merges nothing.
///
/// A failed generation is logged and ends the loop, leaving the partially
/// merged result in place. O(n²) per generation in the live unit count.
pub(crate) fn run_to_fixed_point(arena: &mut UnitArena, pass: MergePass, config: &AggregationConfig) {
    run_to_fixed_point_with(arena, pass, config, union_pair);
}

/// [`run_to_fixed_point`] with a custom union step. Returns the number of
/// generations that completed.
pub(crate) fn run_to_fixed_point_with(
    arena: &mut UnitArena,
    pass: MergePass,
    config: &AggregationConfig,
    union: UnionFn,
) -> usize {
    let mut iteration = 0;
    loop {
        iteration += 1;
        match merge_generation(arena, pass, config, iteration, union) {
            Ok(0) => {
                debug!(pass = pass.name(), iteration, units = arena.len(), "fixed point reached");
                return iteration;
            }
            Ok(merged) => {
                debug!(pass = pass.name(), iteration, merged, units = arena.len(), "merged units");
            }
            Err(err) => {
                warn!(error = %err, iterations = iteration, "aggregation pass stopped early");
                return iteration - 1;
            }
        }
    }
}
