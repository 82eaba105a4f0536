mod attributes;
mod identifier;
mod spatial_entity;

pub use attributes::{BorderStyle, Color, DisplayAttributes, DragCapability, FillStyle};
pub use identifier::{EntityIdentifier, ToolType};
pub use spatial_entity::SpatialEntity;
