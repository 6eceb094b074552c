//! .shp file header

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::bbox::BoundingBox;
use crate::constants::{SHP_FILE_CODE, SHP_HEADER_LEN};
use crate::error::{Result, ShapefileError};
use crate::types::ShapeType;

/// Decoded 100-byte .shp header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShpHeader {
    /// Total file length in bytes (stored on disk as 16-bit words)
    pub file_length: u32,
    /// Format version, normally 1000
    pub version: u32,
    /// Shape type shared by every non-null record
    pub shape_type: ShapeType,
    /// X/Y extent of all shapes
    pub bounding_box: BoundingBox,
}

impl ShpHeader {
    /// Decode a header from exactly 100 bytes.
    ///
    /// Layout: file code (BE) at 0, file length in words (BE) at 24, version
    /// (LE) at 28, shape type (LE) at 32, bounding box at 36. Z and M ranges
    /// in bytes 68..100 are ignored.
    pub fn decode(buf: &[u8], precision: Option<u32>) -> Result<Self> {
        if buf.len() != SHP_HEADER_LEN {
            return Err(ShapefileError::LengthMismatch {
                expected: SHP_HEADER_LEN,
                actual: buf.len(),
            });
        }

        let code = BigEndian::read_u32(&buf[0..4]);
        if code != SHP_FILE_CODE {
            return Err(ShapefileError::InvalidFileCode(code));
        }

        let shape_type = ShapeType::from_u32(LittleEndian::read_u32(&buf[32..36]))?;

        Ok(Self {
            file_length: BigEndian::read_u32(&buf[24..28]).wrapping_mul(2),
            version: LittleEndian::read_u32(&buf[28..32]),
            shape_type,
            bounding_box: BoundingBox::decode(&buf[36..68], precision)?,
        })
    }

    /// Encode into the on-disk layout. Unused fields are zeroed.
    pub fn encode(&self) -> [u8; SHP_HEADER_LEN] {
        let mut out = [0u8; SHP_HEADER_LEN];
        BigEndian::write_u32(&mut out[0..4], SHP_FILE_CODE);
        BigEndian::write_u32(&mut out[24..28], self.file_length / 2);
        LittleEndian::write_u32(&mut out[28..32], self.version);
        LittleEndian::write_u32(&mut out[32..36], self.shape_type.code());
        out[36..68].copy_from_slice(&self.bounding_box.encode());
        out
    }
}
