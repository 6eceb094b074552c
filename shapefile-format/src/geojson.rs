//! GeoJSON geometry output

use serde_json::{json, Value};

use crate::bbox::BoundingBox;
use crate::geometry::{Part, Point, Shape};

impl Shape {
    /// Convert to a GeoJSON geometry object.
    ///
    /// Points become `Point`, polylines `MultiLineString` and polygons
    /// `Polygon` with one ring per part. Multi-part shapes carry a `bbox`.
    pub fn to_geojson(&self) -> Value {
        match self {
            Shape::Point(p) => json!({
                "type": "Point",
                "coordinates": position(p),
            }),
            Shape::Polyline(line) => json!({
                "type": "MultiLineString",
                "bbox": bbox(&line.bounding_box),
                "coordinates": positions(&line.parts),
            }),
            Shape::Polygon(polygon) => json!({
                "type": "Polygon",
                "bbox": bbox(&polygon.bounding_box),
                "coordinates": positions(&polygon.parts),
            }),
        }
    }
}

fn position(point: &Point) -> Value {
    json!([point.x, point.y])
}

fn positions(parts: &[Part]) -> Value {
    Value::Array(
        parts
            .iter()
            .map(|part| Value::Array(part.iter().map(position).collect()))
            .collect(),
    )
}

fn bbox(b: &BoundingBox) -> Value {
    json!(b.to_array())
}
