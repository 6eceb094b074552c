//! Shapefile I/O - Streaming scanners over .shp and .dbf files
//!
//! This crate provides the threaded reading layer on top of `shapefile-format`:
//!
//! - Geometry and attribute scanners decoding on background threads
//! - A combined scanner pairing both files record by record
//! - Zip archive member discovery
//! - Path-based `open` helpers

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod dbf_scanner;
pub mod scanner;
pub mod shp_scanner;
pub mod worker;

// Re-export commonly used types
pub use archive::{open_zip, ZipMembers, ZipScanner};
pub use dbf_scanner::{DbfRecords, DbfScanner};
pub use scanner::{Info, Record, Records, ShapefileScanner};
pub use shapefile_format::{
    BoundingBox, CharacterDecoder, DbfRecord, DecodeOpts, FieldDesc, FieldType, FieldValue,
    FileKind, Limits, Result, Shape, ShapeType, ShapefileError, Validate, Validator,
};
pub use shp_scanner::{Shapes, ShpScanner};
pub use worker::ScanState;

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// Boxed input stream used by [`open`]
pub type Input = Box<dyn Read + Send>;

/// Combined scanner returned by [`open`]
pub type FileScanner = ShapefileScanner<Input, Input>;

/// Open a shapefile from disk.
///
/// `path` may name the `.zip` archive or any member of a plain shapefile
/// (`.shp`, `.dbf`, or no extension at all); the sibling `.shp` and `.dbf`
/// are opened next to it. A sibling `.cpg` overrides
/// `opts.character_decoder`.
pub fn open<P: AsRef<Path>>(path: P, opts: DecodeOpts) -> Result<FileScanner> {
    let path = path.as_ref();
    if has_extension(path, "zip") {
        let name = path.to_string_lossy();
        let reader = BufReader::new(File::open(path)?);
        let (shp, dbf, opts) = archive::extract_members(reader, &name, opts)?;
        tracing::debug!(path = %path.display(), "opened zipped shapefile");
        return Ok(ShapefileScanner::new(
            Box::new(Cursor::new(shp)),
            Box::new(Cursor::new(dbf)),
            opts,
        ));
    }

    let (shp, dbf, opts) = open_members(path, opts)?;
    Ok(ShapefileScanner::new(shp, dbf, opts))
}

fn open_members(path: &Path, mut opts: DecodeOpts) -> Result<(Input, Input, DecodeOpts)> {
    let shp_path = path.with_extension("shp");
    let dbf_path = path.with_extension("dbf");
    let cpg_path = path.with_extension("cpg");

    if cpg_path.is_file() {
        let decoder = shapefile_format::read_cpg(BufReader::new(File::open(&cpg_path)?))?;
        tracing::debug!(path = %cpg_path.display(), charset = decoder.name(), "using charset from .cpg");
        opts.character_decoder = decoder;
    }

    let shp: Input = Box::new(BufReader::new(File::open(&shp_path)?));
    let dbf: Input = Box::new(BufReader::new(File::open(&dbf_path)?));
    tracing::debug!(shp = %shp_path.display(), dbf = %dbf_path.display(), "opened shapefile");
    Ok((shp, dbf, opts))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}
