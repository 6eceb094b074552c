//! Bounding boxes

use std::fmt;

use crate::constants::BOUNDING_BOX_LEN;
use crate::error::{Result, ShapefileError};
use crate::primitives::read_coord;

/// Axis-aligned bounding box. Ordering of min/max is not checked here;
/// use [`crate::Validator`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// Minimum X (longitude)
    pub min_x: f64,
    /// Minimum Y (latitude)
    pub min_y: f64,
    /// Maximum X (longitude)
    pub max_x: f64,
    /// Maximum Y (latitude)
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a box from its four corners.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Decode a box from 32 bytes, rounding each coordinate if `precision` is set.
    pub fn decode(buf: &[u8], precision: Option<u32>) -> Result<Self> {
        if buf.len() < BOUNDING_BOX_LEN {
            return Err(ShapefileError::TooShort {
                expected: BOUNDING_BOX_LEN,
                actual: buf.len(),
            });
        }

        Ok(Self {
            min_x: read_coord(&buf[0..8], precision),
            min_y: read_coord(&buf[8..16], precision),
            max_x: read_coord(&buf[16..24], precision),
            max_y: read_coord(&buf[24..32], precision),
        })
    }

    /// Encode as four little-endian doubles.
    pub fn encode(&self) -> [u8; BOUNDING_BOX_LEN] {
        let mut out = [0u8; BOUNDING_BOX_LEN];
        out[0..8].copy_from_slice(&self.min_x.to_le_bytes());
        out[8..16].copy_from_slice(&self.min_y.to_le_bytes());
        out[16..24].copy_from_slice(&self.max_x.to_le_bytes());
        out[24..32].copy_from_slice(&self.max_y.to_le_bytes());
        out
    }

    /// GeoJSON `bbox` member order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}), ({},{})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
