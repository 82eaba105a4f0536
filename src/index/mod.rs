mod band;
mod offsets;
mod snapshot;
mod spatial_index;

pub use band::{Band, EntityBuilder, EventEntities};
pub use offsets::RangeOffsets;
pub use snapshot::{DrawSnapshot, EntityRenderer};
pub use spatial_index::SpatialEntityIndex;
