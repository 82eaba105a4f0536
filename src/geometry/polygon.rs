use geo::{Area, Geometry, Polygon};

use crate::error::GeometryError;

/// Flattens a geometry into its simple polygons.
///
/// Multi-polygons are split into their parts and collections are walked
/// recursively. Rectangles and triangles are converted; points and lines
/// contribute nothing.
#[must_use]
pub fn flatten_polygons(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons);
    polygons
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon.clone()),
        Geometry::MultiPolygon(multi) => out.extend(multi.0.iter().cloned()),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for child in &collection.0 {
                collect_polygons(child, out);
            }
        }
        Geometry::Point(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiPoint(_)
        | Geometry::MultiLineString(_) => {}
    }
}

/// Collects the parts of a geometry that are not polygons, walking
/// collections recursively.
#[must_use]
pub fn non_polygonal_parts(geometry: &Geometry<f64>) -> Vec<Geometry<f64>> {
    let mut parts = Vec::new();
    collect_non_polygonal(geometry, &mut parts);
    parts
}

fn collect_non_polygonal(geometry: &Geometry<f64>, out: &mut Vec<Geometry<f64>>) {
    match geometry {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {}
        Geometry::GeometryCollection(collection) => {
            for child in &collection.0 {
                collect_non_polygonal(child, out);
            }
        }
        other => out.push(other.clone()),
    }
}

/// Returns `true` if the geometry is, or (recursively) contains, a polygon.
#[must_use]
pub fn is_polygonal(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => true,
        Geometry::MultiPolygon(multi) => !multi.0.is_empty(),
        Geometry::GeometryCollection(collection) => collection.0.iter().any(is_polygonal),
        Geometry::Point(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiPoint(_)
        | Geometry::MultiLineString(_) => false,
    }
}

/// Counts the simple polygons reachable from a geometry.
#[must_use]
pub fn polygon_count(geometry: &Geometry<f64>) -> usize {
    match geometry {
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => 1,
        Geometry::MultiPolygon(multi) => multi.0.len(),
        Geometry::GeometryCollection(collection) => collection.0.iter().map(polygon_count).sum(),
        _ => 0,
    }
}

/// Checks that a polygon can take part in boolean operations.
///
/// # Errors
///
/// - `GeometryError::NonFinite` if any ring holds a NaN or infinite coordinate
/// - `GeometryError::Degenerate` if the exterior ring has fewer than four
///   coordinates or the polygon encloses no area
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    let all_finite = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.0.iter())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !all_finite {
        return Err(GeometryError::NonFinite);
    }

    let exterior_len = polygon.exterior().0.len();
    if exterior_len < 4 {
        return Err(GeometryError::Degenerate(format!(
            "exterior ring has {exterior_len} coordinates, at least 4 required"
        )));
    }

    if polygon.unsigned_area() <= 0.0 {
        return Err(GeometryError::Degenerate("polygon encloses no area".to_owned()));
    }

    Ok(())
}
