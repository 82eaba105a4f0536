mod polygon;

pub use polygon::{flatten_polygons, is_polygonal, non_polygonal_parts, polygon_count, validate_polygon};
