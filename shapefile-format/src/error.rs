//! Error types for shapefile decoding

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Which member file of a shapefile an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// The .shp geometry file.
    Shp,
    /// The .dbf attribute file.
    Dbf,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Shp => f.write_str("shp"),
            FileKind::Dbf => f.write_str("dbf"),
        }
    }
}

/// Shapefile error types
#[derive(Debug, Clone, Error)]
pub enum ShapefileError {
    /// The .shp header does not start with the expected file code.
    #[error("bad file code {0:#010x}")]
    InvalidFileCode(u32),
    /// Shape type code is not part of the format.
    #[error("invalid shape type {0}")]
    InvalidShapeType(u32),
    /// The .dbf format level is not supported by this decoder.
    #[error("unsupported dBase version '{0}'")]
    UnsupportedVersion(u8),
    /// The .dbf header length does not describe a whole number of fields.
    #[error("invalid header size {0} bytes")]
    InvalidHeaderLength(u16),
    /// Field descriptor carries an unrecognized type tag.
    #[error("unrecognized field type '{0}'")]
    UnknownFieldType(char),
    /// Two field descriptors share a name.
    #[error("duplicate field name '{0}'")]
    DuplicateFieldName(String),
    /// Field name does not fit in a descriptor.
    #[error("field name exceeds maximum length of 11 bytes ({0} bytes)")]
    FieldNameTooLong(usize),
    /// The field descriptor array is not followed by 0x0D.
    #[error("missing field descriptor terminator")]
    MissingTerminator,
    /// The byte after the last record is present but is not 0x1A.
    #[error("incorrect end-of-file marker, expecting 0x1a, have {0:#04x}")]
    InvalidEndMarker(u8),
    /// Buffer size differs from what the encoded counts require.
    #[error("expecting {expected} bytes but have {actual}")]
    LengthMismatch {
        /// Bytes required by the layout.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
    /// Buffer is shorter than the fixed minimum for the structure.
    #[error("expecting at least {expected} bytes but only have {actual}")]
    TooShort {
        /// Minimum bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
    /// Record contents are internally inconsistent.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
    /// A configured limit was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
    /// Error attached to a 1-based record number.
    #[error("error reading record {number}: {source}")]
    Record {
        /// Record number within its file.
        number: u32,
        /// Underlying cause.
        source: Box<ShapefileError>,
    },
    /// Error decoding a single attribute field.
    #[error("failed to decode field '{name}' ({position}): {source}")]
    Field {
        /// Field name.
        name: String,
        /// Zero-based position in the descriptor list.
        position: usize,
        /// Underlying cause.
        source: Box<ShapefileError>,
    },
    /// Record shape type differs from the header's shape type.
    #[error("unexpected shape type; expecting {expected}, got {actual}")]
    ShapeTypeMismatch {
        /// Shape type code declared in the header.
        expected: u32,
        /// Shape type code found in the record.
        actual: u32,
    },
    /// Shape type is recognized but has no structured decoder.
    #[error("unsupported shape type {0}")]
    UnsupportedShape(u32),
    /// Numeric text could not be parsed.
    #[error("failed to parse number '{0}'")]
    InvalidNumber(String),
    /// Date text could not be parsed.
    #[error("failed to parse date '{0}'")]
    InvalidDate(String),
    /// Character bytes are not valid in the configured encoding.
    #[error("invalid {encoding} character data")]
    InvalidCharacters {
        /// Name of the encoding used.
        encoding: &'static str,
    },
    /// First record byte is neither 0x20 nor 0x2A.
    #[error("missing deletion flag, have {0:#04x}")]
    MissingDeletionFlag(u8),
    /// Field type is a valid descriptor tag but cannot be decoded.
    #[error("unsupported field type '{0}'")]
    UnsupportedFieldType(char),
    /// Shape failed explicit validation.
    #[error("{0}")]
    Validation(String),
    /// Header of one member file failed to decode.
    #[error("failed to parse {file} header: {source}")]
    Header {
        /// File whose header failed.
        file: FileKind,
        /// Underlying cause.
        source: Box<ShapefileError>,
    },
    /// Record-stage error reported by one member file.
    #[error("error in {file} file: {source}")]
    Source {
        /// File that failed.
        file: FileKind,
        /// Underlying cause.
        source: Box<ShapefileError>,
    },
    /// One member file ran out of records before the other.
    #[error("failed to read {file} record; expecting {expected} but have read {read}")]
    CountMismatch {
        /// Short (or long) side.
        file: FileKind,
        /// Records declared by the .dbf header.
        expected: u32,
        /// Records actually paired.
        read: u32,
    },
    /// A member file holds more records than the .dbf header declares.
    #[error("{file} file has more records than the {expected} declared")]
    ExcessRecords {
        /// File with the surplus.
        file: FileKind,
        /// Records declared by the .dbf header.
        expected: u32,
    },
    /// Zip archive could not be read.
    #[error("zip archive error: {0}")]
    Archive(String),
    /// Archive name does not end in `.zip`.
    #[error("expecting name to be *.zip, got '{0}'")]
    InvalidArchiveName(String),
    /// Required member is absent from the archive.
    #[error("missing .{0} file")]
    MissingMember(&'static str),
    /// More than one candidate member with the same extension.
    #[error("found multiple .{0} files")]
    DuplicateMember(&'static str),
    /// Character set name could not be resolved.
    #[error("unknown charset '{0}'")]
    UnknownCharset(String),
    /// Scanning was requested before the header was read.
    #[error("header has not been read")]
    HeaderNotRead,
    /// A background worker failed outside of decoding.
    #[error("internal error: {0}")]
    Internal(String),
    /// Encountered unexpected end of input.
    #[error("unexpected end of file: read {read} bytes but expecting {expected}")]
    UnexpectedEof {
        /// Bytes needed.
        expected: usize,
        /// Bytes actually read.
        read: usize,
    },
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for ShapefileError {
    fn from(err: std::io::Error) -> Self {
        ShapefileError::Io(Arc::new(err))
    }
}

impl ShapefileError {
    /// Attach a 1-based record number.
    pub fn at_record(self, number: u32) -> Self {
        ShapefileError::Record {
            number,
            source: Box::new(self),
        }
    }

    /// Attach field name and position.
    pub fn in_field(self, name: &str, position: usize) -> Self {
        ShapefileError::Field {
            name: name.to_string(),
            position,
            source: Box::new(self),
        }
    }

    /// Attribute a record-stage error to a member file.
    pub fn in_file(self, file: FileKind) -> Self {
        ShapefileError::Source {
            file,
            source: Box::new(self),
        }
    }

    /// Record number this error is attached to, if any.
    pub fn record_number(&self) -> Option<u32> {
        match self {
            ShapefileError::Record { number, .. } => Some(*number),
            ShapefileError::Source { source, .. } | ShapefileError::Header { source, .. } => {
                source.record_number()
            }
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ShapefileError>;
