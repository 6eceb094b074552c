//! Point, Polyline and Polygon decoding
//!
//! Multi-part payload layout:
//!
//! ```text
//! [bbox: 32][num_parts: u32 LE][num_points: u32 LE]
//! [part start index: u32 LE * num_parts][x,y: f64 LE * num_points]
//! ```

use crate::bbox::BoundingBox;
use crate::constants::{MULTI_PART_PREFIX_LEN, POINT_LEN};
use crate::error::{Result, ShapefileError};
use crate::primitives::{read_coord, read_count};
use crate::types::ShapeType;

/// A single X/Y coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// X coordinate (longitude)
    pub x: f64,
    /// Y coordinate (latitude)
    pub y: f64,
    record_number: u32,
    shape_box: Option<BoundingBox>,
}

impl Point {
    /// Create a free-standing point with no record number and no enclosing box.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            record_number: 0,
            shape_box: None,
        }
    }

    /// Position of the owning record in the .shp file.
    pub fn record_number(&self) -> u32 {
        self.record_number
    }

    /// Bounding box of the enclosing multi-part shape, if any.
    pub fn shape_box(&self) -> Option<&BoundingBox> {
        self.shape_box.as_ref()
    }

    /// Coordinates as a tuple.
    pub fn coords(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// An ordered run of points forming one line or ring of a multi-part shape
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Part {
    points: Vec<Point>,
}

impl Part {
    /// Wrap a point sequence.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Points in order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the part has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over the points.
    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Number of edges after collapsing consecutive duplicate points.
    pub fn edge_count(&self) -> usize {
        let mut distinct = 0usize;
        let mut last: Option<(f64, f64)> = None;
        for point in &self.points {
            let coords = point.coords();
            if last != Some(coords) {
                distinct += 1;
                last = Some(coords);
            }
        }
        distinct.saturating_sub(1)
    }
}

impl From<Vec<Point>> for Part {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Ordered set of vertices made of one or more parts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polyline {
    /// Bounding box stored in the record
    pub bounding_box: BoundingBox,
    /// Parts in file order
    pub parts: Vec<Part>,
    record_number: u32,
}

impl Polyline {
    /// Build a polyline outside of any file.
    pub fn new(bounding_box: BoundingBox, parts: Vec<Part>) -> Self {
        Self {
            bounding_box,
            parts,
            record_number: 0,
        }
    }

    /// Position in the .shp file.
    pub fn record_number(&self) -> u32 {
        self.record_number
    }

    /// Total number of points across all parts.
    pub fn point_count(&self) -> usize {
        self.parts.iter().map(Part::len).sum()
    }
}

/// Same layout as [`Polyline`], but every part is a closed ring
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    /// Bounding box stored in the record
    pub bounding_box: BoundingBox,
    /// Rings in file order
    pub parts: Vec<Part>,
    record_number: u32,
}

impl Polygon {
    /// Build a polygon outside of any file.
    pub fn new(bounding_box: BoundingBox, parts: Vec<Part>) -> Self {
        Self {
            bounding_box,
            parts,
            record_number: 0,
        }
    }

    /// Position in the .shp file.
    pub fn record_number(&self) -> u32 {
        self.record_number
    }

    /// Total number of points across all rings.
    pub fn point_count(&self) -> usize {
        self.parts.iter().map(Part::len).sum()
    }
}

impl From<Polyline> for Polygon {
    fn from(line: Polyline) -> Self {
        Self {
            bounding_box: line.bounding_box,
            parts: line.parts,
            record_number: line.record_number,
        }
    }
}

/// A decoded shape record
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Point record
    Point(Point),
    /// Polyline record
    Polyline(Polyline),
    /// Polygon record
    Polygon(Polygon),
}

impl Shape {
    /// Decode a payload of the given type.
    pub fn decode(
        shape_type: ShapeType,
        buf: &[u8],
        record_number: u32,
        precision: Option<u32>,
    ) -> Result<Self> {
        match shape_type {
            ShapeType::Point => decode_point(buf, record_number, precision).map(Shape::Point),
            ShapeType::Polyline => {
                decode_polyline(buf, record_number, precision).map(Shape::Polyline)
            }
            ShapeType::Polygon => decode_polygon(buf, record_number, precision).map(Shape::Polygon),
            other => Err(ShapefileError::UnsupportedShape(other.code())),
        }
    }

    /// Shape type tag.
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Point(_) => ShapeType::Point,
            Shape::Polyline(_) => ShapeType::Polyline,
            Shape::Polygon(_) => ShapeType::Polygon,
        }
    }

    /// Position in the .shp file.
    pub fn record_number(&self) -> u32 {
        match self {
            Shape::Point(p) => p.record_number(),
            Shape::Polyline(p) => p.record_number(),
            Shape::Polygon(p) => p.record_number(),
        }
    }

    /// Record-level bounding box; points have none.
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        match self {
            Shape::Point(_) => None,
            Shape::Polyline(p) => Some(&p.bounding_box),
            Shape::Polygon(p) => Some(&p.bounding_box),
        }
    }

    /// Parts of a multi-part shape; empty for points.
    pub fn parts(&self) -> &[Part] {
        match self {
            Shape::Point(_) => &[],
            Shape::Polyline(p) => &p.parts,
            Shape::Polygon(p) => &p.parts,
        }
    }

    /// Iterate over every point in file order.
    pub fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_> {
        match self {
            Shape::Point(p) => Box::new(std::iter::once(p)),
            Shape::Polyline(_) | Shape::Polygon(_) => {
                Box::new(self.parts().iter().flat_map(Part::iter))
            }
        }
    }

    /// Total number of points.
    pub fn point_count(&self) -> usize {
        match self {
            Shape::Point(_) => 1,
            Shape::Polyline(p) => p.point_count(),
            Shape::Polygon(p) => p.point_count(),
        }
    }
}

/// Decode a single point payload.
pub fn decode_point(buf: &[u8], record_number: u32, precision: Option<u32>) -> Result<Point> {
    if buf.len() < POINT_LEN {
        return Err(ShapefileError::TooShort {
            expected: POINT_LEN,
            actual: buf.len(),
        });
    }

    Ok(Point {
        x: read_coord(&buf[0..8], precision),
        y: read_coord(&buf[8..16], precision),
        record_number,
        shape_box: None,
    })
}

/// Decode a polyline payload. Structure is not validated beyond the byte layout.
pub fn decode_polyline(
    buf: &[u8],
    record_number: u32,
    precision: Option<u32>,
) -> Result<Polyline> {
    let (bounding_box, parts) = decode_multi_part(buf, record_number, precision)?;
    Ok(Polyline {
        bounding_box,
        parts,
        record_number,
    })
}

/// Decode a polygon payload. Ring closure is not checked.
pub fn decode_polygon(buf: &[u8], record_number: u32, precision: Option<u32>) -> Result<Polygon> {
    decode_polyline(buf, record_number, precision).map(Polygon::from)
}

fn decode_multi_part(
    buf: &[u8],
    record_number: u32,
    precision: Option<u32>,
) -> Result<(BoundingBox, Vec<Part>)> {
    if buf.len() < MULTI_PART_PREFIX_LEN {
        return Err(ShapefileError::TooShort {
            expected: MULTI_PART_PREFIX_LEN,
            actual: buf.len(),
        });
    }

    let bounding_box = BoundingBox::decode(&buf[0..32], precision)?;
    let num_parts = read_count(&buf[32..36]);
    let num_points = read_count(&buf[36..40]);

    let expected = MULTI_PART_PREFIX_LEN as u64
        + 4 * num_parts as u64
        + POINT_LEN as u64 * num_points as u64;
    if buf.len() as u64 != expected {
        return Err(ShapefileError::LengthMismatch {
            expected: usize::try_from(expected).unwrap_or(usize::MAX),
            actual: buf.len(),
        });
    }

    let starts: Vec<usize> = (0..num_parts)
        .map(|i| {
            let offset = MULTI_PART_PREFIX_LEN + i * 4;
            read_count(&buf[offset..offset + 4])
        })
        .collect();

    let points_offset = MULTI_PART_PREFIX_LEN + num_parts * 4;
    let mut parts = Vec::with_capacity(num_parts);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(num_points);
        if start > end || end > num_points {
            return Err(ShapefileError::CorruptRecord(format!(
                "part {} spans points {}..{} of {}",
                i, start, end, num_points
            )));
        }

        let mut points = Vec::with_capacity(end - start);
        for index in start..end {
            let offset = points_offset + index * POINT_LEN;
            let mut point = decode_point(&buf[offset..offset + POINT_LEN], record_number, precision)?;
            point.shape_box = Some(bounding_box);
            points.push(point);
        }
        parts.push(Part::new(points));
    }

    Ok((bounding_box, parts))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 404 bytes of a Natural Earth polyline: 3 parts with 8, 9 and 5 points.
    pub(crate) const SAMPLE_POLYLINE_HEX: &str = "00000000008066c036936fb6b94932c000000000008066402ec5218a580530c00300000016000000000000000800000011000000000000000080664072d6329b2f1130c00000000000806640aae943ac228e30c0dc06830ea76b6640cd00718a25cd30c06677b1af335766408d99c529150331c099e0404d19536640093d9b559fa330c0ebd1846c17636640560bf797196f30c032d5fc773b6d66409a797db3096130c0000000000080664072d6329b2f1130c07b6b60ab044466409ab1683a3b8131c024b9fc87f44b66409e4143ff045731c01b12f758fa5666401bd82ac1e2a031c082c5e1ccaf516640ca1af5108d2632c033c9c859d83d664036936fb6b94932c06e179aeb342c6640271422e0102a32c0a9c1340c1f296640e10b93a982b931c0c3bb5cc4773566408c321b64926131c07b6b60ab044466409ab1683a3b8131c0f073dae0627966c02ec5218a580530c0653d0a175b7d66c06a4c0ddc748030c000000000008066c0aae943ac228e30c000000000008066c072d6329b2f1130c0f073dae0627966c02ec5218a580530c0";

    pub(crate) fn hex_bytes(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    pub(crate) fn encode_multi_part(bbox: BoundingBox, parts: &[Vec<(f64, f64)>]) -> Vec<u8> {
        let num_points: usize = parts.iter().map(Vec::len).sum();
        let mut buf = bbox.encode().to_vec();
        buf.extend_from_slice(&(parts.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(num_points as u32).to_le_bytes());
        let mut start = 0u32;
        for part in parts {
            buf.extend_from_slice(&start.to_le_bytes());
            start += part.len() as u32;
        }
        for (x, y) in parts.iter().flatten() {
            buf.extend_from_slice(&x.to_le_bytes());
            buf.extend_from_slice(&y.to_le_bytes());
        }
        buf
    }

    fn coords(part: &Part) -> Vec<(f64, f64)> {
        part.iter().map(Point::coords).collect()
    }

    #[test]
    fn test_decode_sample_polyline() {
        let buf = hex_bytes(SAMPLE_POLYLINE_HEX);
        assert_eq!(buf.len(), 404);

        let line = decode_polyline(&buf, 0, None).unwrap();
        assert_eq!(
            line.bounding_box,
            BoundingBox::new(-180.0, -18.28799, 180.0, -16.020882256741224)
        );
        assert_eq!(line.parts.len(), 3);

        assert_eq!(
            coords(&line.parts[0]),
            vec![
                (180.0, -16.067132663642447),
                (180.0, -16.555216566639196),
                (179.36414266196414, -16.801354076946883),
                (178.72505936299711, -17.01204167436804),
                (178.59683859511713, -16.639150000000004),
                (179.0966093629971, -16.433984277547403),
                (179.4135093629971, -16.379054277547404),
                (180.0, -16.067132663642447),
            ]
        );
        assert_eq!(
            coords(&line.parts[1]),
            vec![
                (178.12557, -17.50481),
                (178.3736, -17.33992),
                (178.71806, -17.62846),
                (178.55271, -18.15059),
                (177.93266000000003, -18.28799),
                (177.38146, -18.16432),
                (177.28504, -17.72465),
                (177.67087, -17.381140000000002),
                (178.12557, -17.50481),
            ]
        );
        assert_eq!(
            coords(&line.parts[2]),
            vec![
                (-179.79332010904864, -16.020882256741224),
                (-179.9173693847653, -16.501783135649397),
                (-180.0, -16.555216566639196),
                (-180.0, -16.067132663642447),
                (-179.79332010904864, -16.020882256741224),
            ]
        );
    }

    #[test]
    fn test_points_reference_shape_box() {
        let buf = hex_bytes(SAMPLE_POLYLINE_HEX);
        let line = decode_polyline(&buf, 9, None).unwrap();
        for point in line.parts.iter().flat_map(Part::iter) {
            assert_eq!(point.shape_box(), Some(&line.bounding_box));
            assert_eq!(point.record_number(), 9);
        }
    }

    #[test]
    fn test_polygon_matches_polyline_decode() {
        let buf = hex_bytes(SAMPLE_POLYLINE_HEX);
        let line = decode_polyline(&buf, 4, None).unwrap();
        let polygon = decode_polygon(&buf, 4, None).unwrap();
        assert_eq!(polygon.parts, line.parts);
        assert_eq!(polygon.bounding_box, line.bounding_box);
        assert_eq!(polygon.record_number(), 4);
        assert_eq!(polygon.point_count(), 22);
    }

    #[test]
    fn test_decode_with_precision() {
        let buf = hex_bytes(SAMPLE_POLYLINE_HEX);
        let line = decode_polyline(&buf, 1, Some(3)).unwrap();
        assert_eq!(line.bounding_box.max_y, -16.021);
        assert_eq!(line.parts[0].points()[0].coords(), (180.0, -16.067));
    }

    #[test]
    fn test_decode_point() {
        let mut buf = 12.5f64.to_le_bytes().to_vec();
        buf.extend_from_slice(&(-3.25f64).to_le_bytes());
        let point = decode_point(&buf, 7, None).unwrap();
        assert_eq!(point.coords(), (12.5, -3.25));
        assert_eq!(point.record_number(), 7);
        assert!(point.shape_box().is_none());
    }

    #[test]
    fn test_decode_point_short() {
        match decode_point(&[0u8; 15], 1, None) {
            Err(ShapefileError::TooShort { expected, actual }) => {
                assert_eq!((expected, actual), (16, 15));
            }
            other => panic!("expected TooShort, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_polyline_prefix_too_short() {
        assert!(matches!(
            decode_polyline(&[0u8; 39], 1, None),
            Err(ShapefileError::TooShort {
                expected: 40,
                actual: 39
            })
        ));
    }

    #[test]
    fn test_decode_polyline_length_mismatch() {
        let mut buf = hex_bytes(SAMPLE_POLYLINE_HEX);
        buf.truncate(400);
        match decode_polyline(&buf, 1, None) {
            Err(ShapefileError::LengthMismatch { expected, actual }) => {
                assert_eq!(expected, 404);
                assert_eq!(actual, 400);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }

        let mut padded = hex_bytes(SAMPLE_POLYLINE_HEX);
        padded.push(0);
        assert!(matches!(
            decode_polyline(&padded, 1, None),
            Err(ShapefileError::LengthMismatch {
                expected: 404,
                actual: 405
            })
        ));
    }

    #[test]
    fn test_decode_polyline_bad_part_index() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let mut buf = encode_multi_part(bbox, &[vec![(0.0, 0.0), (1.0, 1.0)], vec![(0.5, 0.5)]]);
        // Second part starts past the point array.
        buf[44..48].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            decode_polyline(&buf, 1, None),
            Err(ShapefileError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_decode_empty_polyline() {
        let buf = encode_multi_part(BoundingBox::default(), &[]);
        let line = decode_polyline(&buf, 1, None).unwrap();
        assert!(line.parts.is_empty());
        assert_eq!(line.point_count(), 0);
    }

    #[test]
    fn test_shape_dispatch() {
        let buf = hex_bytes(SAMPLE_POLYLINE_HEX);
        let shape = Shape::decode(ShapeType::Polygon, &buf, 2, None).unwrap();
        assert_eq!(shape.shape_type(), ShapeType::Polygon);
        assert_eq!(shape.record_number(), 2);
        assert_eq!(shape.points().count(), 22);
        assert_eq!(shape.point_count(), 22);
        assert!(shape.bounding_box().is_some());

        assert!(matches!(
            Shape::decode(ShapeType::MultiPoint, &buf, 2, None),
            Err(ShapefileError::UnsupportedShape(8))
        ));
    }

    #[test]
    fn test_edge_count_collapses_duplicates() {
        let part = Part::new(vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0)]);
        assert_eq!(part.edge_count(), 0);
        let part = Part::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ]);
        assert_eq!(part.edge_count(), 2);
        assert_eq!(Part::default().edge_count(), 0);
    }
}
