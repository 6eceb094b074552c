//! Attribute record decoding

use serde_json::{Map, Value};

use crate::constants::{DBF_RECORD_ACTIVE, DBF_RECORD_DELETED};
use crate::dbf_header::DbfHeader;
use crate::error::{Result, ShapefileError};
use crate::field::{
    decode_character, decode_date, decode_floating_point, decode_numeric, Field, FieldValue,
};
use crate::types::FieldType;
use crate::DecodeOpts;

/// One decoded .dbf record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbfRecord {
    deleted: bool,
    fields: Vec<Field>,
}

impl DbfRecord {
    /// Build a record from already-decoded fields.
    pub fn new(deleted: bool, fields: Vec<Field>) -> Self {
        Self { deleted, fields }
    }

    /// True if the record carries the deletion marker.
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Kept fields in declared order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Fields as a JSON object in declared order.
    pub fn to_json_properties(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.name().to_string(), f.value().to_json()))
            .collect()
    }
}

/// Decode one fixed-length record using the header's field layout.
pub fn decode_record(buf: &[u8], header: &DbfHeader, opts: &DecodeOpts) -> Result<DbfRecord> {
    let deleted = match buf.first() {
        Some(&DBF_RECORD_ACTIVE) => false,
        Some(&DBF_RECORD_DELETED) => true,
        Some(&other) => return Err(ShapefileError::MissingDeletionFlag(other)),
        None => {
            return Err(ShapefileError::TooShort {
                expected: 1,
                actual: 0,
            })
        }
    };

    let mut fields = Vec::with_capacity(header.fields().len());
    let mut offset = 1usize;
    for (position, desc) in header.fields().iter().enumerate() {
        let end = offset + desc.length() as usize;
        let bytes = buf.get(offset..end).ok_or_else(|| {
            ShapefileError::TooShort {
                expected: end,
                actual: buf.len(),
            }
            .in_field(desc.name(), position)
        })?;
        offset = end;

        if !opts.keeps_field(desc.name()) {
            continue;
        }

        let value = decode_value(desc.field_type(), bytes, opts)
            .map_err(|e| e.in_field(desc.name(), position))?;
        fields.push(Field::new(desc.name(), value));
    }

    Ok(DbfRecord { deleted, fields })
}

fn decode_value(field_type: FieldType, bytes: &[u8], opts: &DecodeOpts) -> Result<FieldValue> {
    match field_type {
        FieldType::Character => decode_character(bytes, &opts.character_decoder),
        FieldType::Numeric => decode_numeric(bytes),
        FieldType::FloatingPoint => decode_floating_point(bytes),
        FieldType::Date => decode_date(bytes),
        FieldType::Logical | FieldType::Memo => {
            Err(ShapefileError::UnsupportedFieldType(field_type.tag() as char))
        }
    }
}
