//! Streaming .dbf scanner

use std::io::Read;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use shapefile_format::constants::DBF_END_OF_FILE;
use shapefile_format::primitives::{read_exact_or_eof, read_full};
use shapefile_format::{decode_record, DbfHeader, DbfRecord, DecodeOpts, Result, ShapefileError};

use crate::worker::{hand_off, join_worker, spawn_worker, ErrorSlot, ScanState};

/// Decodes attribute records from a .dbf stream on a background thread.
///
/// Same protocol as [`crate::ShpScanner`]: header, scan, drain, check `err`.
pub struct DbfScanner<R> {
    input: Option<R>,
    header: Option<Result<DbfHeader>>,
    rx: Option<Receiver<DbfRecord>>,
    handle: Option<JoinHandle<()>>,
    error: ErrorSlot,
    finished: bool,
    opts: DecodeOpts,
}

impl<R: Read + Send + 'static> DbfScanner<R> {
    /// Create a scanner over `input`.
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

    /// Read and cache the header.
    pub fn header(&mut self) -> Result<DbfHeader> {
        if let Some(cached) = &self.header {
            return cached.clone();
        }

        let result = match self.input.as_mut() {
            Some(input) => DbfHeader::decode(input),
            None => Err(ShapefileError::Internal("input already consumed".to_string())),
        };
        match &result {
            Ok(header) => tracing::debug!(
                records = header.num_records(),
                record_len = header.record_len(),
                fields = header.fields().len(),
                "decoded dbf header"
            ),
            Err(err) => tracing::debug!(error = %err, "failed to decode dbf header"),
        }
        self.header = Some(result.clone());
        result
    }

    /// Start the background worker. Requires a successfully read header.
    pub fn scan(&mut self) -> Result<()> {
        if self.rx.is_some() {
            return Ok(());
        }
        let header = match &self.header {
            Some(Ok(header)) => header.clone(),
            Some(Err(err)) => return Err(err.clone()),
            None => return Err(ShapefileError::HeaderNotRead),
        };
        let input = self
            .input
            .take()
            .ok_or_else(|| ShapefileError::Internal("input already consumed".to_string()))?;

        let (tx, rx) = sync_channel(0);
        let opts = self.opts.clone();
        let handle = spawn_worker("dbf-scanner", self.error.clone(), tx, move |tx| {
            scan_records(input, &header, &opts, tx)
        })?;

        self.rx = Some(rx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Next record, blocking until decoded. `None` means end of stream or failure.
    pub fn record(&mut self) -> Option<DbfRecord> {
        if self.finished {
            return None;
        }
        let record = self.rx.as_ref()?.recv().ok();
        if record.is_none() {
            self.finished = true;
            if let Some(handle) = self.handle.take() {
                join_worker(handle, &self.error);
            }
        }
        record
    }

    /// Iterate over records. A failed scan ends with one `Err` item.
    pub fn records(&mut self) -> DbfRecords<'_, R> {
        DbfRecords {
            scanner: self,
            reported: false,
        }
    }

    /// First error recorded, if any.
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
}

/// Iterator over the records of a [`DbfScanner`]
pub struct DbfRecords<'a, R> {
    scanner: &'a mut DbfScanner<R>,
    reported: bool,
}

impl<R: Read + Send + 'static> Iterator for DbfRecords<'_, R> {
    type Item = Result<DbfRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reported {
            return None;
        }
        match self.scanner.record() {
            Some(record) => Some(Ok(record)),
            None => {
                self.reported = true;
                self.scanner.err().map(Err)
            }
        }
    }
}

fn scan_records<R: Read>(
    mut input: R,
    header: &DbfHeader,
    opts: &DecodeOpts,
    tx: &SyncSender<DbfRecord>,
) -> Result<()> {
    let mut buf = vec![0u8; header.record_len() as usize];

    for index in 0..header.num_records() {
        let number = index + 1;
        let record = read_exact_or_eof(&mut input, &mut buf)
            .and_then(|()| decode_record(&buf, header, opts))
            .map_err(|e| e.at_record(number))?;

        if !hand_off(tx, record) {
            tracing::debug!(record = number, "dbf consumer went away");
            return Ok(());
        }
    }

    let mut marker = [0u8; 1];
    match read_full(&mut input, &mut marker)? {
        0 => tracing::debug!("dbf file has no end-of-file marker"),
        _ if marker[0] == DBF_END_OF_FILE => {}
        _ => return Err(ShapefileError::InvalidEndMarker(marker[0])),
    }
    Ok(())
}
