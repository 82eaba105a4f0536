mod aggregate;
mod config;
mod dehole;

pub use aggregate::{aggregate_events, Aggregate};
pub use config::{
    AggregationConfig, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_MAX_DEHOLE_ITERATIONS,
    DEFAULT_SIMPLIFICATION_LEVEL,
};
pub use dehole::{dehole_geometry, Dehole, DeholeOutcome};
