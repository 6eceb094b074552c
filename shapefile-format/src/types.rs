//! Shape type and field type tags

use std::fmt;

use crate::error::{Result, ShapefileError};

/// Shape type codes. A .shp file declares one non-null type in its header;
/// every record must carry that type or `Null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShapeType {
    /// Record without geometry
    Null = 0,
    /// Single X/Y point
    Point = 1,
    /// One or more line strings
    Polyline = 3,
    /// One or more rings
    Polygon = 5,
    /// Set of points
    MultiPoint = 8,
    /// Point with Z
    PointZ = 11,
    /// Polyline with Z
    PolylineZ = 13,
    /// Polygon with Z
    PolygonZ = 15,
    /// MultiPoint with Z
    MultiPointZ = 18,
    /// Point with M
    PointM = 21,
    /// Polyline with M
    PolylineM = 23,
    /// Polygon with M
    PolygonM = 25,
    /// MultiPoint with M
    MultiPointM = 28,
    /// Surface patches
    MultiPatch = 31,
}

impl ShapeType {
    /// Convert from the on-disk code
    pub fn from_u32(val: u32) -> Result<Self> {
        match val {
            0 => Ok(ShapeType::Null),
            1 => Ok(ShapeType::Point),
            3 => Ok(ShapeType::Polyline),
            5 => Ok(ShapeType::Polygon),
            8 => Ok(ShapeType::MultiPoint),
            11 => Ok(ShapeType::PointZ),
            13 => Ok(ShapeType::PolylineZ),
            15 => Ok(ShapeType::PolygonZ),
            18 => Ok(ShapeType::MultiPointZ),
            21 => Ok(ShapeType::PointM),
            23 => Ok(ShapeType::PolylineM),
            25 => Ok(ShapeType::PolygonM),
            28 => Ok(ShapeType::MultiPointM),
            31 => Ok(ShapeType::MultiPatch),
            _ => Err(ShapefileError::InvalidShapeType(val)),
        }
    }

    /// On-disk code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// True for the types with a structured decoder.
    pub fn is_decodable(self) -> bool {
        matches!(
            self,
            ShapeType::Point | ShapeType::Polyline | ShapeType::Polygon
        )
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeType::Null => "Null Shape",
            ShapeType::Point => "Point",
            ShapeType::Polyline => "PolyLine",
            ShapeType::Polygon => "Polygon",
            ShapeType::MultiPoint => "MultiPoint",
            ShapeType::PointZ => "PointZ",
            ShapeType::PolylineZ => "PolyLineZ",
            ShapeType::PolygonZ => "PolygonZ",
            ShapeType::MultiPointZ => "MultiPointZ",
            ShapeType::PointM => "PointM",
            ShapeType::PolylineM => "PolyLineM",
            ShapeType::PolygonM => "PolygonM",
            ShapeType::MultiPointM => "MultiPointM",
            ShapeType::MultiPatch => "MultiPatch",
        };
        f.write_str(name)
    }
}

/// dBase level 5 field type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Text padded with spaces
    Character = b'C',
    /// Calendar date
    Date = b'D',
    /// Floating point number as ASCII text
    FloatingPoint = b'F',
    /// Boolean flag
    Logical = b'L',
    /// Reference into a memo file
    Memo = b'M',
    /// Number as ASCII text
    Numeric = b'N',
}

impl FieldType {
    /// Convert from the descriptor byte
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            b'C' => Ok(FieldType::Character),
            b'D' => Ok(FieldType::Date),
            b'F' => Ok(FieldType::FloatingPoint),
            b'L' => Ok(FieldType::Logical),
            b'M' => Ok(FieldType::Memo),
            b'N' => Ok(FieldType::Numeric),
            _ => Err(ShapefileError::UnknownFieldType(val as char)),
        }
    }

    /// Descriptor byte
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}
