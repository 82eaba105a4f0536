/// Simplification level in geometry units (degrees of latitude/longitude).
pub const DEFAULT_SIMPLIFICATION_LEVEL: f64 = 0.0005;

/// Polygons closer than this are merged during the distance pass.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.01;

/// Upper bound on hole-pruning rounds per polygon.
pub const DEFAULT_MAX_DEHOLE_ITERATIONS: usize = 3;

/// Thresholds used by [`super::Aggregate`] and [`super::Dehole`].
///
/// All distances are in geometry coordinate units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationConfig {
    /// Base simplification level.
    pub simplification_level: f64,
    /// Radius used to buffer interior rings while pruning holes.
    pub dehole_buffer_radius: f64,
    /// Maximum distance at which two polygons are still merged.
    pub distance_threshold: f64,
    /// Maximum number of hole-pruning rounds.
    pub max_dehole_iterations: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            simplification_level: DEFAULT_SIMPLIFICATION_LEVEL,
            dehole_buffer_radius: DEFAULT_SIMPLIFICATION_LEVEL / 4.0,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            max_dehole_iterations: DEFAULT_MAX_DEHOLE_ITERATIONS,
        }
    }
}

impl AggregationConfig {
    /// Sets the simplification level and derives the dehole radius from it
    /// (one quarter of the level).
    #[must_use]
    pub fn with_simplification_level(mut self, level: f64) -> Self {
        self.simplification_level = level;
        self.dehole_buffer_radius = level / 4.0;
        self
    }

    /// Overrides the dehole buffer radius.
    #[must_use]
    pub fn with_dehole_buffer_radius(mut self, radius: f64) -> Self {
        self.dehole_buffer_radius = radius;
        self
    }

    /// Sets the distance-merge threshold.
    #[must_use]
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Sets the maximum number of hole-pruning rounds.
    #[must_use]
    pub fn with_max_dehole_iterations(mut self, iterations: usize) -> Self {
        self.max_dehole_iterations = iterations;
        self
    }
}
