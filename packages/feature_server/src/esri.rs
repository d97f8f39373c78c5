//! Esri JSON geometry encoding.
//!
//! Points become `{x, y}`, multipoints `{points}`, lines `{paths}`, polygons
//! `{rings}` and rectangles envelopes. Polygon rings are re-oriented to the
//! Esri winding convention: exterior rings clockwise, holes
//! counter-clockwise.

use geo::orient::{Direction, Orient};
use serde_json::json;

fn coords(line: &geo::LineString<f64>) -> Vec<[f64; 2]> {
    line.coords().map(|c| [c.x, c.y]).collect()
}

fn rings(polygon: &geo::Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    let polygon = polygon.orient(Direction::Reversed);
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(coords)
        .collect()
}

/// Encodes a geometry as Esri JSON.
///
/// Geometry collections are encoded as their first member (`null` when
/// empty), since Esri geometries are homogeneous.
#[must_use]
pub fn to_esri_geometry(geometry: &geo::Geometry<f64>) -> serde_json::Value {
    match geometry {
        geo::Geometry::Point(p) => json!({ "x": p.x(), "y": p.y() }),
        geo::Geometry::MultiPoint(mp) => json!({
            "points": mp.iter().map(|p| [p.x(), p.y()]).collect::<Vec<_>>(),
        }),
        geo::Geometry::Line(line) => json!({
            "paths": [[[line.start.x, line.start.y], [line.end.x, line.end.y]]],
        }),
        geo::Geometry::LineString(ls) => json!({ "paths": [coords(ls)] }),
        geo::Geometry::MultiLineString(mls) => json!({
            "paths": mls.iter().map(coords).collect::<Vec<_>>(),
        }),
        geo::Geometry::Polygon(polygon) => json!({ "rings": rings(polygon) }),
        geo::Geometry::MultiPolygon(mp) => json!({
            "rings": mp.iter().flat_map(rings).collect::<Vec<_>>(),
        }),
        geo::Geometry::Triangle(triangle) => json!({ "rings": rings(&triangle.to_polygon()) }),
        geo::Geometry::Rect(rect) => json!({
            "xmin": rect.min().x,
            "ymin": rect.min().y,
            "xmax": rect.max().x,
            "ymax": rect.max().y,
        }),
        geo::Geometry::GeometryCollection(collection) => collection
            .0
            .first()
            .map_or(serde_json::Value::Null, to_esri_geometry),
    }
}
