//! Fixed-width little-endian decoding helpers

use std::io::{ErrorKind, Read};

use byteorder::{ByteOrder, LittleEndian};

/// Decode a little-endian IEEE-754 double from the first 8 bytes.
#[inline]
pub fn read_f64(buf: &[u8]) -> f64 {
    LittleEndian::read_f64(buf)
}

/// Round half away from zero to `precision` decimal digits.
#[inline]
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() / scale
}

/// Decode a double and apply the optional precision override.
#[inline]
pub fn read_coord(buf: &[u8], precision: Option<u32>) -> f64 {
    let value = read_f64(buf);
    match precision {
        Some(p) => round_to(value, p),
        None => value,
    }
}

/// Decode a little-endian u32 count from the first 4 bytes.
#[inline]
pub fn read_count(buf: &[u8]) -> usize {
    LittleEndian::read_u32(buf) as usize
}

/// Fill `buf` from `reader`, stopping early only at end of input.
///
/// Returns the number of bytes read, which is less than `buf.len()` only
/// when the reader is exhausted.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Like [`read_full`], but a short read is an [`crate::ShapefileError::UnexpectedEof`].
pub fn read_exact_or_eof<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> crate::Result<()> {
    let read = read_full(reader, buf)?;
    if read < buf.len() {
        return Err(crate::ShapefileError::UnexpectedEof {
            expected: buf.len(),
            read,
        });
    }
    Ok(())
}
