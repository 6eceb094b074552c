//! .dbf header and field descriptors

use std::collections::HashSet;
use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::constants::{
    DBF_FIELD_DESC_LEN, DBF_FIELD_NAME_LEN, DBF_FIELD_TERMINATOR, DBF_PROLOGUE_LEN,
    DBF_VERSION_MASK,
};
use crate::error::{Result, ShapefileError};
use crate::primitives::read_exact_or_eof;
use crate::types::FieldType;

/// dBase format level, taken from the low three bits of the first header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DbaseVersion {
    /// dBase level 5, the only level decoded
    Level5 = 3,
}

impl DbaseVersion {
    /// Convert from the masked version bits.
    pub fn from_u8(val: u8) -> Result<Self> {
        match val & DBF_VERSION_MASK {
            3 => Ok(DbaseVersion::Level5),
            other => Err(ShapefileError::UnsupportedVersion(other)),
        }
    }
}

/// A single 32-byte field descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    name: String,
    field_type: FieldType,
    length: u8,
}

impl FieldDesc {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, field_type: FieldType, length: u8) -> Self {
        Self {
            name: name.into(),
            field_type,
            length,
        }
    }

    /// Decode from a 32-byte descriptor slot.
    ///
    /// Name is bytes 0..11 with NUL padding removed, type tag at 11, length at 16.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < DBF_FIELD_DESC_LEN {
            return Err(ShapefileError::TooShort {
                expected: DBF_FIELD_DESC_LEN,
                actual: buf.len(),
            });
        }

        let field_type = FieldType::from_u8(buf[11])?;
        let name = String::from_utf8_lossy(&buf[..DBF_FIELD_NAME_LEN])
            .trim_matches('\0')
            .to_string();

        Ok(Self {
            name,
            field_type,
            length: buf[16],
        })
    }

    /// Encode into a 32-byte descriptor slot.
    pub fn encode(&self) -> Result<[u8; DBF_FIELD_DESC_LEN]> {
        let name = self.name.as_bytes();
        if name.len() > DBF_FIELD_NAME_LEN {
            return Err(ShapefileError::FieldNameTooLong(name.len()));
        }

        let mut out = [0u8; DBF_FIELD_DESC_LEN];
        out[..name.len()].copy_from_slice(name);
        out[11] = self.field_type.tag();
        out[16] = self.length;
        Ok(out)
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Width of the field in each record, in bytes.
    pub fn length(&self) -> u8 {
        self.length
    }
}

/// Decoded .dbf header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfHeader {
    fields: Vec<FieldDesc>,
    version: DbaseVersion,
    header_len: u16,
    record_len: u16,
    num_records: u32,
}

impl DbfHeader {
    /// Build a header for the given fields, computing the header length.
    pub fn new(
        fields: Vec<FieldDesc>,
        version: DbaseVersion,
        record_len: u16,
        num_records: u32,
    ) -> Result<Self> {
        check_unique(&fields)?;

        let header_len = DBF_PROLOGUE_LEN + fields.len() * DBF_FIELD_DESC_LEN + 1;
        let header_len = u16::try_from(header_len).map_err(|_| {
            ShapefileError::LimitExceeded(format!("{} field descriptors", fields.len()))
        })?;

        Ok(Self {
            fields,
            version,
            header_len,
            record_len,
            num_records,
        })
    }

    /// Read and decode a header, leaving `reader` positioned at the first record.
    pub fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut prologue = [0u8; DBF_PROLOGUE_LEN];
        read_exact_or_eof(reader, &mut prologue)?;

        let version = DbaseVersion::from_u8(prologue[0])?;
        let num_records = LittleEndian::read_u32(&prologue[4..8]);
        let header_len = LittleEndian::read_u16(&prologue[8..10]);
        let record_len = LittleEndian::read_u16(&prologue[10..12]);

        let rest_len = (header_len as usize)
            .checked_sub(DBF_PROLOGUE_LEN + 1)
            .filter(|n| n % DBF_FIELD_DESC_LEN == 0)
            .ok_or(ShapefileError::InvalidHeaderLength(header_len))?;

        let mut rest = vec![0u8; rest_len + 1];
        read_exact_or_eof(reader, &mut rest)?;

        if rest[rest_len] != DBF_FIELD_TERMINATOR {
            return Err(ShapefileError::MissingTerminator);
        }

        let fields = rest[..rest_len]
            .chunks_exact(DBF_FIELD_DESC_LEN)
            .map(FieldDesc::decode)
            .collect::<Result<Vec<_>>>()?;
        check_unique(&fields)?;

        Ok(Self {
            fields,
            version,
            header_len,
            record_len,
            num_records,
        })
    }

    /// Write the header in its on-disk layout, including the terminator.
    pub fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let mut prologue = [0u8; DBF_PROLOGUE_LEN];
        prologue[0] = self.version as u8;
        LittleEndian::write_u32(&mut prologue[4..8], self.num_records);
        LittleEndian::write_u16(&mut prologue[8..10], self.header_len);
        LittleEndian::write_u16(&mut prologue[10..12], self.record_len);
        writer.write_all(&prologue)?;

        for field in &self.fields {
            writer.write_all(&field.encode()?)?;
        }
        writer.write_all(&[DBF_FIELD_TERMINATOR])?;
        Ok(())
    }

    /// Field descriptors in declared order.
    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    /// dBase level.
    pub fn version(&self) -> DbaseVersion {
        self.version
    }

    /// Header length in bytes, including the terminator.
    pub fn header_len(&self) -> u16 {
        self.header_len
    }

    /// Length of each record in bytes, including the deletion flag.
    pub fn record_len(&self) -> u16 {
        self.record_len
    }

    /// Number of records declared.
    pub fn num_records(&self) -> u32 {
        self.num_records
    }

    /// True if a field with exactly this name is declared.
    pub fn field_exists(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

fn check_unique(fields: &[FieldDesc]) -> Result<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(ShapefileError::DuplicateFieldName(field.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> DbfHeader {
        DbfHeader::new(
            vec![
                FieldDesc::new("field-1", FieldType::Character, 8),
                FieldDesc::new("field-2", FieldType::FloatingPoint, 32),
            ],
            DbaseVersion::Level5,
            1024,
            128,
        )
        .unwrap()
    }

    fn encoded(header: &DbfHeader) -> Vec<u8> {
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header();
        assert_eq!(header.header_len(), 97);

        let buf = encoded(&header);
        assert_eq!(buf.len(), 97);

        let decoded = DbfHeader::decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.record_len(), 1024);
        assert_eq!(decoded.num_records(), 128);
        assert!(decoded.field_exists("field-2"));
        assert!(!decoded.field_exists("field-3"));
    }

    #[test]
    fn test_decode_leaves_reader_at_records() {
        let mut buf = encoded(&sample_header());
        buf.extend_from_slice(b" record");
        let mut cursor = Cursor::new(buf);
        DbfHeader::decode(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 97);
    }

    #[test]
    fn test_version_bits_masked() {
        let mut buf = encoded(&sample_header());
        // dBase III with memo flag set in the high bits.
        buf[0] = 0x83;
        assert!(DbfHeader::decode(&mut Cursor::new(buf)).is_ok());
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = encoded(&sample_header());
        buf[0] = 0x04;
        match DbfHeader::decode(&mut Cursor::new(buf)) {
            Err(ShapefileError::UnsupportedVersion(v)) => assert_eq!(v, 4),
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_header_length() {
        let mut buf = encoded(&sample_header());
        LittleEndian::write_u16(&mut buf[8..10], 96);
        assert!(matches!(
            DbfHeader::decode(&mut Cursor::new(buf.clone())),
            Err(ShapefileError::InvalidHeaderLength(96))
        ));

        LittleEndian::write_u16(&mut buf[8..10], 20);
        assert!(matches!(
            DbfHeader::decode(&mut Cursor::new(buf)),
            Err(ShapefileError::InvalidHeaderLength(20))
        ));
    }

    #[test]
    fn test_missing_terminator() {
        let mut buf = encoded(&sample_header());
        buf[96] = 0x00;
        assert!(matches!(
            DbfHeader::decode(&mut Cursor::new(buf)),
            Err(ShapefileError::MissingTerminator)
        ));
    }

    #[test]
    fn test_truncated_header() {
        let buf = encoded(&sample_header());
        match DbfHeader::decode(&mut Cursor::new(&buf[..50])) {
            Err(ShapefileError::UnexpectedEof { expected, read }) => {
                assert_eq!((expected, read), (65, 18));
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field_type() {
        let mut buf = encoded(&sample_header());
        buf[32 + 11] = b'Q';
        assert!(matches!(
            DbfHeader::decode(&mut Cursor::new(buf)),
            Err(ShapefileError::UnknownFieldType('Q'))
        ));
    }

    #[test]
    fn test_duplicate_field_names() {
        let fields = vec![
            FieldDesc::new("NAME", FieldType::Character, 8),
            FieldDesc::new("NAME", FieldType::Numeric, 4),
        ];
        assert!(matches!(
            DbfHeader::new(fields, DbaseVersion::Level5, 13, 0),
            Err(ShapefileError::DuplicateFieldName(name)) if name == "NAME"
        ));

        let mut buf = encoded(&sample_header());
        buf[32 + 6] = b'2';
        assert!(matches!(
            DbfHeader::decode(&mut Cursor::new(buf)),
            Err(ShapefileError::DuplicateFieldName(_))
        ));
    }

    #[test]
    fn test_field_name_too_long() {
        let desc = FieldDesc::new("ABCDEFGHIJKL", FieldType::Character, 1);
        assert!(matches!(
            desc.encode(),
            Err(ShapefileError::FieldNameTooLong(12))
        ));
    }

    #[test]
    fn test_field_desc_decode() {
        let desc = FieldDesc::new("POP_EST", FieldType::Numeric, 19);
        let decoded = FieldDesc::decode(&desc.encode().unwrap()).unwrap();
        assert_eq!(decoded.name(), "POP_EST");
        assert_eq!(decoded.field_type(), FieldType::Numeric);
        assert_eq!(decoded.length(), 19);

        assert!(matches!(
            FieldDesc::decode(&[0u8; 31]),
            Err(ShapefileError::TooShort { .. })
        ));
    }
}
