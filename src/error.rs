use thiserror::Error;

use crate::entity::EntityIdentifier;
use crate::event::EventId;

/// Top-level error type for hazard geometry processing.
#[derive(Debug, Error)]
pub enum HazardError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("geometry contains non-finite coordinates")]
    NonFinite,

    #[error("operation produced an empty result: {0}")]
    EmptyResult(String),
}

/// Errors raised while merging polygons during aggregation.
///
/// These never escape [`crate::operations::Aggregate::execute`]; they are
/// logged and the failing pass is treated as having made no progress.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("{pass} pass failed to merge at iteration {iteration}: {reason}")]
    MergeFailed {
        pass: &'static str,
        iteration: usize,
        reason: GeometryError,
    },
}

/// Errors related to spatial entity index bookkeeping.
///
/// Every variant signals a caller bug (a violated precondition) or a broken
/// internal invariant, never a recoverable runtime condition.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("event {0} is not present in the ordered event list")]
    EventNotInOrder(EventId),

    #[error("event {0} already has entities in the index")]
    EventAlreadyIndexed(EventId),

    #[error("event {0} has no entities in the index")]
    EventNotIndexed(EventId),

    #[error("identifier {0:?} is already present in the index")]
    DuplicateIdentifier(EntityIdentifier),

    #[error("event {0} supplied entities for both the unselected and selected bands")]
    MixedSelectionBands(EventId),

    #[error("identifier {identifier:?} does not belong in the {band} band")]
    MisplacedIdentifier {
        identifier: EntityIdentifier,
        band: &'static str,
    },

    #[error("index invariant violated: {0}")]
    InvariantViolated(String),
}

/// Convenience type alias for results using [`HazardError`].
pub type Result<T> = std::result::Result<T, HazardError>;
