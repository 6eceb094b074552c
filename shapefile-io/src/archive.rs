//! Zipped shapefiles

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use shapefile_format::{read_cpg, DecodeOpts, Result, ShapefileError};
use zip::ZipArchive;

use crate::scanner::ShapefileScanner;

/// Combined scanner over members buffered from a zip archive
pub type ZipScanner = ShapefileScanner<Cursor<Vec<u8>>, Cursor<Vec<u8>>>;

/// Member names selected from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipMembers {
    /// Geometry member
    pub shp: String,
    /// Attribute member
    pub dbf: String,
    /// Optional charset member
    pub cpg: Option<String>,
}

/// Open a zipped shapefile.
///
/// `name` is the archive's file name and must end in `.zip`; members named
/// after its stem are preferred. A `.cpg` member, when present, overrides
/// `opts.character_decoder`.
pub fn open_zip<R: Read + Seek>(reader: R, name: &str, opts: DecodeOpts) -> Result<ZipScanner> {
    let (shp, dbf, opts) = extract_members(reader, name, opts)?;
    Ok(ShapefileScanner::new(Cursor::new(shp), Cursor::new(dbf), opts))
}

/// Buffer the .shp and .dbf members, applying any .cpg to `opts`.
pub(crate) fn extract_members<R: Read + Seek>(
    reader: R,
    name: &str,
    mut opts: DecodeOpts,
) -> Result<(Vec<u8>, Vec<u8>, DecodeOpts)> {
    let stem = archive_stem(name)?;
    let mut archive = ZipArchive::new(reader).map_err(archive_error)?;
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let members = find_members(&names, &stem)?;
    tracing::debug!(shp = %members.shp, dbf = %members.dbf, cpg = ?members.cpg, "selected zip members");

    if let Some(cpg) = &members.cpg {
        let decoder = read_cpg(Cursor::new(read_member(&mut archive, cpg)?))?;
        tracing::debug!(charset = decoder.name(), "using charset from .cpg");
        opts.character_decoder = decoder;
    }

    let shp = read_member(&mut archive, &members.shp)?;
    let dbf = read_member(&mut archive, &members.dbf)?;
    Ok((shp, dbf, opts))
}

/// Pick the .shp, .dbf and .cpg members for an archive stem.
pub fn find_members(names: &[String], stem: &str) -> Result<ZipMembers> {
    let exact = |ext: &str| {
        let wanted = format!("{}.{}", stem, ext);
        names.iter().find(|n| **n == wanted).cloned()
    };

    if let Some(shp) = exact("shp") {
        let dbf = exact("dbf").ok_or(ShapefileError::MissingMember("dbf"))?;
        return Ok(ZipMembers {
            shp,
            dbf,
            cpg: exact("cpg"),
        });
    }

    let shp = by_suffix(names, "shp")?.ok_or(ShapefileError::MissingMember("shp"))?;
    let dbf = by_suffix(names, "dbf")?.ok_or(ShapefileError::MissingMember("dbf"))?;
    let cpg = by_suffix(names, "cpg")?;
    Ok(ZipMembers { shp, dbf, cpg })
}

fn by_suffix(names: &[String], ext: &'static str) -> Result<Option<String>> {
    let suffix = format!(".{}", ext);
    let mut found = names.iter().filter(|n| n.ends_with(&suffix));
    let first = found.next().cloned();
    if found.next().is_some() {
        return Err(ShapefileError::DuplicateMember(ext));
    }
    Ok(first)
}

fn archive_stem(name: &str) -> Result<String> {
    let file_name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    file_name
        .strip_suffix(".zip")
        .map(str::to_string)
        .ok_or_else(|| ShapefileError::InvalidArchiveName(name.to_string()))
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name).map_err(archive_error)?;
    let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn archive_error(err: zip::result::ZipError) -> ShapefileError {
    ShapefileError::Archive(err.to_string())
}
