//! In-memory shapefile fixtures shared by the integration tests

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::sync::mpsc::Sender;

use shapefile_format::{BoundingBox, DbaseVersion, DbfHeader, FieldDesc, ShapeType, ShpHeader};

/// Geometry of one synthetic record; `None` writes a null shape.
pub type FixtureShape = Option<Vec<Vec<(f64, f64)>>>;

/// Builds matching .shp and .dbf byte streams
pub struct ShapefileFixture {
    pub shape_type: ShapeType,
    pub bounding_box: BoundingBox,
    pub shapes: Vec<FixtureShape>,
    pub fields: Vec<FieldDesc>,
    pub rows: Vec<Vec<String>>,
    pub end_marker: Option<u8>,
}

impl ShapefileFixture {
    pub fn new(shape_type: ShapeType) -> Self {
        Self {
            shape_type,
            bounding_box: BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            shapes: Vec::new(),
            fields: Vec::new(),
            rows: Vec::new(),
            end_marker: Some(0x1A),
        }
    }

    /// Two named points, the common small case.
    pub fn points() -> Self {
        Self::new(ShapeType::Point)
            .field(FieldDesc::new("NAME", shapefile_format::FieldType::Character, 10))
            .field(FieldDesc::new("POP", shapefile_format::FieldType::Numeric, 8))
            .record(Some(vec![vec![(178.0, -17.0)]]), &["Fiji", "920938"])
            .record(Some(vec![vec![(35.0, -6.0)]]), &["Tanzania", "53950935"])
    }

    pub fn field(mut self, desc: FieldDesc) -> Self {
        self.fields.push(desc);
        self
    }

    pub fn record(mut self, shape: FixtureShape, values: &[&str]) -> Self {
        self.shapes.push(shape);
        self.rows.push(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn shp_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (index, shape) in self.shapes.iter().enumerate() {
            let content = self.shape_content(shape.as_ref());
            body.extend_from_slice(&(index as u32 + 1).to_be_bytes());
            body.extend_from_slice(&((content.len() / 2) as u32).to_be_bytes());
            body.extend_from_slice(&content);
        }

        let header = ShpHeader {
            file_length: (100 + body.len()) as u32,
            version: 1000,
            shape_type: self.shape_type,
            bounding_box: self.bounding_box,
        };
        let mut out = header.encode().to_vec();
        out.extend_from_slice(&body);
        out
    }

    pub fn dbf_bytes(&self) -> Vec<u8> {
        self.dbf_bytes_declaring(self.rows.len() as u32)
    }

    /// .dbf bytes whose header declares `num_records` regardless of the rows written.
    pub fn dbf_bytes_declaring(&self, num_records: u32) -> Vec<u8> {
        let record_len = 1 + self.fields.iter().map(|f| f.length() as u16).sum::<u16>();
        let header = DbfHeader::new(
            self.fields.clone(),
            DbaseVersion::Level5,
            record_len,
            num_records,
        )
        .expect("fixture header");

        let mut out = Vec::new();
        header.encode(&mut out).expect("fixture header encode");
        for row in &self.rows {
            out.push(b' ');
            for (field, value) in self.fields.iter().zip(row) {
                let width = field.length() as usize;
                let mut cell = value.as_bytes().to_vec();
                cell.resize(width, b' ');
                out.extend_from_slice(&cell[..width]);
            }
        }
        out.extend(self.end_marker);
        out
    }

    pub fn cursors(&self) -> (Cursor<Vec<u8>>, Cursor<Vec<u8>>) {
        (Cursor::new(self.shp_bytes()), Cursor::new(self.dbf_bytes()))
    }

    /// Zip archive holding `<stem>.shp`, `<stem>.dbf` and an optional `<stem>.cpg`.
    pub fn zip_bytes(&self, stem: &str, cpg: Option<&str>) -> Vec<u8> {
        let mut members = vec![
            (format!("{}.shp", stem), self.shp_bytes()),
            (format!("{}.dbf", stem), self.dbf_bytes()),
        ];
        if let Some(cpg) = cpg {
            members.push((format!("{}.cpg", stem), cpg.as_bytes().to_vec()));
        }
        zip_members(&members)
    }

    fn shape_content(&self, shape: Option<&Vec<Vec<(f64, f64)>>>) -> Vec<u8> {
        let Some(parts) = shape else {
            return ShapeType::Null.code().to_le_bytes().to_vec();
        };

        let mut out = self.shape_type.code().to_le_bytes().to_vec();
        if self.shape_type == ShapeType::Point {
            let (x, y) = parts[0][0];
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
            return out;
        }

        let points: Vec<(f64, f64)> = parts.iter().flatten().copied().collect();
        let bbox = BoundingBox::new(
            points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min),
            points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min),
            points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max),
            points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max),
        );
        out.extend_from_slice(&bbox.encode());
        out.extend_from_slice(&(parts.len() as u32).to_le_bytes());
        out.extend_from_slice(&(points.len() as u32).to_le_bytes());
        let mut start = 0u32;
        for part in parts {
            out.extend_from_slice(&start.to_le_bytes());
            start += part.len() as u32;
        }
        for (x, y) in points {
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
        }
        out
    }
}

/// Write named members into an in-memory zip archive.
pub fn zip_members(members: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in members {
        writer.start_file(name.as_str(), options).expect("zip entry");
        writer.write_all(bytes).expect("zip write");
    }
    writer.finish().expect("zip finish").into_inner()
}

/// Reader that reports on `dropped` once it is released.
pub struct DropSignal {
    inner: Cursor<Vec<u8>>,
    dropped: Sender<&'static str>,
    label: &'static str,
}

impl DropSignal {
    pub fn new(bytes: Vec<u8>, label: &'static str, dropped: Sender<&'static str>) -> Self {
        Self {
            inner: Cursor::new(bytes),
            dropped,
            label,
        }
    }
}

impl Read for DropSignal {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for DropSignal {
    fn drop(&mut self) {
        let _ = self.dropped.send(self.label);
    }
}
