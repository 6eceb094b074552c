//! Streaming .shp scanner

use std::io::Read;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use shapefile_format::constants::{SHP_HEADER_LEN, SHP_RECORD_PREFIX_LEN};
use shapefile_format::primitives::{read_exact_or_eof, read_full};
use shapefile_format::{
    DecodeOpts, Result, Shape, ShapeType, ShapefileError, ShpHeader, Validator,
};

use crate::worker::{hand_off, join_worker, spawn_worker, ErrorSlot, ScanState};

/// One .shp record as seen by the scanner's consumer
#[derive(Debug)]
pub(crate) enum ShpEntry {
    Shape(Shape),
    Null(u32),
}

/// Decodes shapes from a .shp stream on a background thread.
///
/// Call [`header`](Self::header), then [`scan`](Self::scan), then
/// [`shape`](Self::shape) until it returns `None`, then check
/// [`err`](Self::err). Dropping the scanner stops the worker at its next
/// hand-off.
pub struct ShpScanner<R> {
    input: Option<R>,
    header: Option<Result<ShpHeader>>,
    rx: Option<Receiver<ShpEntry>>,
    handle: Option<JoinHandle<()>>,
    error: ErrorSlot,
    finished: bool,
    opts: DecodeOpts,
}

impl<R: Read + Send + 'static> ShpScanner<R> {
    /// Create a scanner over `input`. Nothing is read until [`header`](Self::header).
    pub fn new(input: R, opts: DecodeOpts) -> Self {
        Self {
            input: Some(input),
            header: None,
            rx: None,
            handle: None,
            error: ErrorSlot::default(),
            finished: false,
            opts,
        }
    }

    /// Read and cache the 100-byte header. Later calls return the cached result.
    pub fn header(&mut self) -> Result<ShpHeader> {
        if let Some(cached) = &self.header {
            return cached.clone();
        }

        let result = match self.input.as_mut() {
            Some(input) => read_header(input, self.opts.precision),
            None => Err(ShapefileError::Internal("input already consumed".to_string())),
        };
        match &result {
            Ok(header) => tracing::debug!(
                shape_type = %header.shape_type,
                file_length = header.file_length,
                "decoded shp header"
            ),
            Err(err) => tracing::debug!(error = %err, "failed to decode shp header"),
        }
        self.header = Some(result.clone());
        result
    }

    /// Start the background worker. Requires a successfully read header; repeated calls are no-ops.
    pub fn scan(&mut self) -> Result<()> {
        if self.rx.is_some() {
            return Ok(());
        }
        let header = match &self.header {
            Some(Ok(header)) => *header,
            Some(Err(err)) => return Err(err.clone()),
            None => return Err(ShapefileError::HeaderNotRead),
        };
        let input = self
            .input
            .take()
            .ok_or_else(|| ShapefileError::Internal("input already consumed".to_string()))?;

        let (tx, rx) = sync_channel(0);
        let opts = self.opts.clone();
        let handle = spawn_worker("shp-scanner", self.error.clone(), tx, move |tx| {
            scan_records(input, header, &opts, tx)
        })?;

        self.rx = Some(rx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Next non-null shape, blocking until one is decoded. `None` means the
    /// stream ended or failed; check [`err`](Self::err).
    pub fn shape(&mut self) -> Option<Shape> {
        loop {
            match self.next_entry()? {
                ShpEntry::Shape(shape) => return Some(shape),
                ShpEntry::Null(number) => tracing::trace!(record = number, "skipping null shape"),
            }
        }
    }

    /// Iterate over shapes. A failed scan ends with one `Err` item.
    pub fn shapes(&mut self) -> Shapes<'_, R> {
        Shapes {
            scanner: self,
            reported: false,
        }
    }

    /// First error recorded by the scan, if any.
    pub fn err(&self) -> Option<ShapefileError> {
        if let Some(Err(err)) = &self.header {
            return Some(err.clone());
        }
        self.error.get()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanState {
        match &self.header {
            None => ScanState::Unopened,
            Some(Err(_)) => ScanState::Errored,
            Some(Ok(_)) if self.rx.is_none() => ScanState::HeaderRead,
            Some(Ok(_)) if self.error.is_set() => ScanState::Errored,
            Some(Ok(_)) if self.finished => ScanState::Done,
            Some(Ok(_)) => ScanState::Scanning,
        }
    }

    /// Build a validator from the header's bounding box.
    pub fn validator(&mut self) -> Result<Validator> {
        let header = self.header()?;
        Validator::new(&header.bounding_box)
    }

    /// Next record including null shapes.
    pub(crate) fn next_entry(&mut self) -> Option<ShpEntry> {
        if self.finished {
            return None;
        }
        let entry = self.rx.as_ref()?.recv().ok();
        if entry.is_none() {
            self.finished = true;
            if let Some(handle) = self.handle.take() {
                join_worker(handle, &self.error);
            }
        }
        entry
    }
}

/// Iterator over the shapes of a [`ShpScanner`]
pub struct Shapes<'a, R> {
    scanner: &'a mut ShpScanner<R>,
    reported: bool,
}

impl<R: Read + Send + 'static> Iterator for Shapes<'_, R> {
    type Item = Result<Shape>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reported {
            return None;
        }
        match self.scanner.shape() {
            Some(shape) => Some(Ok(shape)),
            None => {
                self.reported = true;
                self.scanner.err().map(Err)
            }
        }
    }
}

fn read_header<R: Read>(input: &mut R, precision: Option<u32>) -> Result<ShpHeader> {
    let mut buf = [0u8; SHP_HEADER_LEN];
    read_exact_or_eof(input, &mut buf)?;
    ShpHeader::decode(&buf, precision)
}

fn scan_records<R: Read>(
    mut input: R,
    header: ShpHeader,
    opts: &DecodeOpts,
    tx: &SyncSender<ShpEntry>,
) -> Result<()> {
    let mut prefix = [0u8; SHP_RECORD_PREFIX_LEN];
    let mut position = 0u32;

    loop {
        position += 1;
        let read = read_full(&mut input, &mut prefix)?;
        if read == 0 {
            tracing::debug!(records = position - 1, "shp stream exhausted");
            return Ok(());
        }
        if read < SHP_RECORD_PREFIX_LEN {
            return Err(ShapefileError::UnexpectedEof {
                expected: SHP_RECORD_PREFIX_LEN,
                read,
            }
            .at_record(position));
        }

        let number = BigEndian::read_u32(&prefix[0..4]);
        let content_len = BigEndian::read_u32(&prefix[4..8]) as usize * 2;
        let tag = LittleEndian::read_u32(&prefix[8..12]);

        let entry = decode_entry(&mut input, &header, opts, number, content_len, tag)
            .map_err(|e| e.at_record(number))?;

        if !hand_off(tx, entry) {
            tracing::debug!(record = number, "shp consumer went away");
            return Ok(());
        }
    }
}

fn decode_entry<R: Read>(
    input: &mut R,
    header: &ShpHeader,
    opts: &DecodeOpts,
    number: u32,
    content_len: usize,
    tag: u32,
) -> Result<ShpEntry> {
    // Content length counts the 4-byte shape type already read.
    let payload_len = content_len
        .checked_sub(4)
        .ok_or_else(|| ShapefileError::CorruptRecord(format!("content length {}", content_len)))?;
    opts.limits.check_record_bytes(content_len)?;

    let mut payload = vec![0u8; payload_len];
    read_exact_or_eof(input, &mut payload)?;

    if tag == ShapeType::Null.code() {
        return Ok(ShpEntry::Null(number));
    }
    if tag != header.shape_type.code() {
        return Err(ShapefileError::ShapeTypeMismatch {
            expected: header.shape_type.code(),
            actual: tag,
        });
    }

    Shape::decode(header.shape_type, &payload, number, opts.precision).map(ShpEntry::Shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile_format::BoundingBox;
    use std::io::Cursor;

    fn header_bytes(shape_type: ShapeType) -> Vec<u8> {
        ShpHeader {
            file_length: 0,
            version: 1000,
            shape_type,
            bounding_box: BoundingBox::new(-10.0, -10.0, 10.0, 10.0),
        }
        .encode()
        .to_vec()
    }

    fn push_record(buf: &mut Vec<u8>, number: u32, tag: u32, payload: &[u8]) {
        buf.extend_from_slice(&number.to_be_bytes());
        buf.extend_from_slice(&(((payload.len() + 4) / 2) as u32).to_be_bytes());
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(payload);
    }

    fn point(x: f64, y: f64) -> Vec<u8> {
        let mut buf = x.to_le_bytes().to_vec();
        buf.extend_from_slice(&y.to_le_bytes());
        buf
    }

    #[test]
    fn test_scan_requires_header() {
        let mut scanner = ShpScanner::new(Cursor::new(Vec::new()), DecodeOpts::default());
        assert_eq!(scanner.state(), ScanState::Unopened);
        assert!(matches!(scanner.scan(), Err(ShapefileError::HeaderNotRead)));
        assert!(scanner.shape().is_none());
    }

    #[test]
    fn test_points_and_null_skipped() {
        let mut buf = header_bytes(ShapeType::Point);
        push_record(&mut buf, 1, 1, &point(1.0, 2.0));
        push_record(&mut buf, 2, 0, &[]);
        push_record(&mut buf, 3, 1, &point(3.0, 4.0));

        let mut scanner = ShpScanner::new(Cursor::new(buf), DecodeOpts::default());
        let header = scanner.header().unwrap();
        assert_eq!(header.shape_type, ShapeType::Point);
        assert_eq!(scanner.state(), ScanState::HeaderRead);

        scanner.scan().unwrap();
        scanner.scan().unwrap();
        assert_eq!(scanner.state(), ScanState::Scanning);

        let shapes: Vec<Shape> = scanner.shapes().collect::<Result<_>>().unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].record_number(), 1);
        assert_eq!(shapes[1].record_number(), 3);
        assert!(scanner.err().is_none());
        assert_eq!(scanner.state(), ScanState::Done);
    }

    #[test]
    fn test_type_mismatch_names_record() {
        let mut buf = header_bytes(ShapeType::Point);
        push_record(&mut buf, 1, 1, &point(1.0, 2.0));
        push_record(&mut buf, 2, 3, &[0u8; 40]);

        let mut scanner = ShpScanner::new(Cursor::new(buf), DecodeOpts::default());
        scanner.header().unwrap();
        scanner.scan().unwrap();
        assert!(scanner.shape().is_some());
        assert!(scanner.shape().is_none());

        match scanner.err() {
            Some(ShapefileError::Record { number, source }) => {
                assert_eq!(number, 2);
                assert!(matches!(
                    *source,
                    ShapefileError::ShapeTypeMismatch {
                        expected: 1,
                        actual: 3
                    }
                ));
            }
            other => panic!("expected Record error, got {other:?}"),
        }
        assert_eq!(scanner.state(), ScanState::Errored);
    }

    #[test]
    fn test_truncated_prefix() {
        let mut buf = header_bytes(ShapeType::Point);
        push_record(&mut buf, 1, 1, &point(1.0, 2.0));
        buf.extend_from_slice(&[0, 0, 0]);

        let mut scanner = ShpScanner::new(Cursor::new(buf), DecodeOpts::default());
        scanner.header().unwrap();
        scanner.scan().unwrap();
        let items: Vec<_> = scanner.shapes().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        match &items[1] {
            Err(ShapefileError::Record { number, source }) => {
                assert_eq!(*number, 2);
                assert!(matches!(
                    **source,
                    ShapefileError::UnexpectedEof { expected: 12, read: 3 }
                ));
            }
            other => panic!("expected Record error, got {other:?}"),
        }
    }

    #[test]
    fn test_record_limit() {
        let mut buf = header_bytes(ShapeType::Point);
        push_record(&mut buf, 1, 1, &point(1.0, 2.0));
        let opts = DecodeOpts::default().with_limits(shapefile_format::Limits {
            max_record_bytes: 8,
        });

        let mut scanner = ShpScanner::new(Cursor::new(buf), opts);
        scanner.header().unwrap();
        scanner.scan().unwrap();
        assert!(scanner.shape().is_none());
        assert_eq!(scanner.err().and_then(|e| e.record_number()), Some(1));
    }

    #[test]
    fn test_header_error_cached() {
        let mut buf = header_bytes(ShapeType::Point);
        buf[0] = 0xFF;
        let mut scanner = ShpScanner::new(Cursor::new(buf), DecodeOpts::default());
        assert!(matches!(
            scanner.header(),
            Err(ShapefileError::InvalidFileCode(_))
        ));
        assert!(matches!(
            scanner.header(),
            Err(ShapefileError::InvalidFileCode(_))
        ));
        assert_eq!(scanner.state(), ScanState::Errored);
        assert!(scanner.scan().is_err());
    }

    #[test]
    fn test_validator_uses_header_box() {
        let buf = header_bytes(ShapeType::Polygon);
        let mut scanner = ShpScanner::new(Cursor::new(buf), DecodeOpts::default());
        assert!(scanner.validator().is_ok());
    }
}
