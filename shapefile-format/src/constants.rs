//! Constants and magic numbers for the .shp and .dbf formats

/// File code stored big-endian at offset 0 of every .shp header.
pub const SHP_FILE_CODE: u32 = 0x0000_270A;

/// Size of the fixed .shp file header.
pub const SHP_HEADER_LEN: usize = 100;

/// Size of a .shp record prefix (record number, content length, shape type).
pub const SHP_RECORD_PREFIX_LEN: usize = 12;

/// Size of an encoded bounding box (four doubles).
pub const BOUNDING_BOX_LEN: usize = 32;

/// Size of an encoded X/Y point.
pub const POINT_LEN: usize = 16;

/// Fixed prefix of a polyline/polygon payload: box, part count, point count.
pub const MULTI_PART_PREFIX_LEN: usize = 40;

/// Size of the fixed .dbf header prologue.
pub const DBF_PROLOGUE_LEN: usize = 32;

/// Size of a single .dbf field descriptor.
pub const DBF_FIELD_DESC_LEN: usize = 32;

/// Maximum length of a field name in bytes.
pub const DBF_FIELD_NAME_LEN: usize = 11;

/// Terminates the field descriptor array.
pub const DBF_FIELD_TERMINATOR: u8 = 0x0D;

/// Optional trailing byte after the last record.
pub const DBF_END_OF_FILE: u8 = 0x1A;

/// Leading record byte for an active record.
pub const DBF_RECORD_ACTIVE: u8 = 0x20;

/// Leading record byte for a deleted record.
pub const DBF_RECORD_DELETED: u8 = 0x2A;

/// Mask selecting the format level bits of the first .dbf byte.
pub const DBF_VERSION_MASK: u8 = 0b0000_0111;

/// Date layout used by `D` fields.
pub const DBF_DATE_FORMAT: &str = "%m/%d/%Y";
