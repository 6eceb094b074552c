//! Shapefile Format - Core decoders for the ESRI Shapefile format
//!
//! This crate decodes the individual pieces of a shapefile with no threading
//! or file handling. It includes:
//!
//! - Constants and little-endian primitives
//! - The .shp header and Point/Polyline/Polygon records
//! - Geographic validation of decoded shapes
//! - The dBase level 5 header, field descriptors and records
//! - Character set resolution for `.cpg` files
//! - GeoJSON geometry output
//! - Error types
//! - Security limits

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bbox;
pub mod charset;
pub mod constants;
pub mod dbf_header;
pub mod error;
pub mod field;
pub mod geojson;
pub mod geometry;
pub mod header;
pub mod limits;
pub mod primitives;
pub mod record;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use bbox::BoundingBox;
pub use charset::{read_cpg, CharacterDecoder};
pub use dbf_header::{DbaseVersion, DbfHeader, FieldDesc};
pub use error::{FileKind, Result, ShapefileError};
pub use field::{Field, FieldValue};
pub use geometry::{Part, Point, Polygon, Polyline, Shape};
pub use header::ShpHeader;
pub use limits::Limits;
pub use record::{decode_record, DbfRecord};
pub use types::{FieldType, ShapeType};
pub use validator::{Validate, Validator};

/// Decoding options shared by every scanner
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodeOpts {
    /// Round decoded coordinates to this many decimal digits
    pub precision: Option<u32>,
    /// Text decoding for character fields
    pub character_decoder: CharacterDecoder,
    /// Attribute allow-list; empty keeps every field
    pub fields: Vec<String>,
    /// Allocation guards
    pub limits: Limits,
}

impl DecodeOpts {
    /// Set the coordinate precision.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set the character decoder.
    pub fn with_character_decoder(mut self, decoder: CharacterDecoder) -> Self {
        self.character_decoder = decoder;
        self
    }

    /// Restrict decoded attributes to the named fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// True if a field with this name should be decoded.
    pub fn keeps_field(&self, name: &str) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|f| f == name)
    }
}
