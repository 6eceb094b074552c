//! Allocation limits applied while decoding untrusted files

/// Limits guarding allocations driven by length fields read from disk.
///
/// Part and point counts inside a record are bounded by the record length
/// itself, since the multi-part layout must match the payload size exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum .shp record content length in bytes (default: 64 MiB)
    pub max_record_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_record_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Limits {
    /// Check a .shp record content length against the configured limit.
    pub fn check_record_bytes(&self, len: usize) -> crate::Result<()> {
        if len > self.max_record_bytes {
            return Err(crate::ShapefileError::LimitExceeded(format!(
                "record of {} bytes exceeds maximum of {}",
                len, self.max_record_bytes
            )));
        }
        Ok(())
    }
}
