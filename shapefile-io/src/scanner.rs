//! Combined scanner pairing geometry with attributes

use std::io::Read;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use serde_json::{json, Value};
use shapefile_format::{
    BoundingBox, DbfRecord, DecodeOpts, FieldDesc, FileKind, Result, Shape, ShapeType,
    ShapefileError, Validator,
};

use crate::dbf_scanner::DbfScanner;
use crate::shp_scanner::{ShpEntry, ShpScanner};
use crate::worker::{hand_off, join_worker, spawn_worker, ErrorSlot, ScanState};

/// Summary of both headers
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    /// Extent from the .shp header
    pub bounding_box: BoundingBox,
    /// Records declared by the .dbf header
    pub num_records: u32,
    /// Shape type from the .shp header
    pub shape_type: ShapeType,
    /// Attribute schema in declared order
    pub fields: Vec<FieldDesc>,
}

impl Info {
    /// True if the attribute schema declares `name`.
    pub fn field_exists(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }
}

/// A geometry paired with its attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Decoded geometry; `None` for a null shape
    pub shape: Option<Shape>,
    /// Attribute values
    pub attributes: DbfRecord,
    number: u32,
}

impl Record {
    /// 1-based position in both files.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// GeoJSON `Feature` with properties in field order.
    pub fn to_geojson_feature(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": self.shape.as_ref().map_or(Value::Null, Shape::to_geojson),
            "properties": Value::Object(self.attributes.to_json_properties()),
        })
    }
}

/// Reads a .shp and .dbf pair in lockstep.
///
/// Both sub-scanners run on their own threads, and a third coordinating
/// thread pairs their output position by position. The first failure stops
/// the scan; when both files fail at the same position, the .shp error is
/// reported.
pub struct ShapefileScanner<S, D> {
    shp: Option<ShpScanner<S>>,
    dbf: Option<DbfScanner<D>>,
    info: Option<Result<Info>>,
    rx: Option<Receiver<Record>>,
    handle: Option<JoinHandle<()>>,
    error: ErrorSlot,
    finished: bool,
}

impl<S, D> ShapefileScanner<S, D>
where
    S: Read + Send + 'static,
    D: Read + Send + 'static,
{
    /// Create a scanner over the two streams.
    pub fn new(shp: S, dbf: D, opts: DecodeOpts) -> Self {
        Self {
            shp: Some(ShpScanner::new(shp, opts.clone())),
            dbf: Some(DbfScanner::new(dbf, opts)),
            info: None,
            rx: None,
            handle: None,
            error: ErrorSlot::default(),
            finished: false,
        }
    }

    /// Decode both headers and cache the summary.
    pub fn info(&mut self) -> Result<Info> {
        if let Some(cached) = &self.info {
            return cached.clone();
        }
        let result = self.read_info();
        self.info = Some(result.clone());
        result
    }

    fn read_info(&mut self) -> Result<Info> {
        let (shp, dbf) = match (self.shp.as_mut(), self.dbf.as_mut()) {
            (Some(shp), Some(dbf)) => (shp, dbf),
            _ => return Err(ShapefileError::Internal("scanners already consumed".to_string())),
        };

        let shp_header = shp.header().map_err(|e| ShapefileError::Header {
            file: FileKind::Shp,
            source: Box::new(e),
        })?;
        let dbf_header = dbf.header().map_err(|e| ShapefileError::Header {
            file: FileKind::Dbf,
            source: Box::new(e),
        })?;

        Ok(Info {
            bounding_box: shp_header.bounding_box,
            num_records: dbf_header.num_records(),
            shape_type: shp_header.shape_type,
            fields: dbf_header.fields().to_vec(),
        })
    }

    /// Start both sub-scanners and the coordinator. Requires a successful [`info`](Self::info).
    pub fn scan(&mut self) -> Result<()> {
        if self.rx.is_some() {
            return Ok(());
        }
        let num_records = match &self.info {
            Some(Ok(info)) => info.num_records,
            Some(Err(err)) => return Err(err.clone()),
            None => return Err(ShapefileError::HeaderNotRead),
        };
        let (mut shp, mut dbf) = match (self.shp.take(), self.dbf.take()) {
            (Some(shp), Some(dbf)) => (shp, dbf),
            _ => return Err(ShapefileError::Internal("scanners already consumed".to_string())),
        };

        shp.scan()?;
        dbf.scan()?;

        let (tx, rx) = sync_channel(0);
        let handle = spawn_worker("shapefile-scanner", self.error.clone(), tx, move |tx| {
            pair_records(&mut shp, &mut dbf, num_records, tx)
        })?;

        self.rx = Some(rx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Next paired record. `None` means end of stream or failure.
    pub fn record(&mut self) -> Option<Record> {
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
    pub fn records(&mut self) -> Records<'_, S, D> {
        Records {
            scanner: self,
            reported: false,
        }
    }

    /// First error recorded, if any.
    pub fn err(&self) -> Option<ShapefileError> {
        if let Some(Err(err)) = &self.info {
            return Some(err.clone());
        }
        self.error.get()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanState {
        match &self.info {
            None => ScanState::Unopened,
            Some(Err(_)) => ScanState::Errored,
            Some(Ok(_)) if self.rx.is_none() => ScanState::HeaderRead,
            Some(Ok(_)) if self.error.is_set() => ScanState::Errored,
            Some(Ok(_)) if self.finished => ScanState::Done,
            Some(Ok(_)) => ScanState::Scanning,
        }
    }

    /// Validator built from the .shp header's bounding box.
    pub fn validator(&mut self) -> Result<Validator> {
        let info = self.info()?;
        Validator::new(&info.bounding_box)
    }
}

/// Iterator over the records of a [`ShapefileScanner`]
pub struct Records<'a, S, D> {
    scanner: &'a mut ShapefileScanner<S, D>,
    reported: bool,
}

impl<S, D> Iterator for Records<'_, S, D>
where
    S: Read + Send + 'static,
    D: Read + Send + 'static,
{
    type Item = Result<Record>;

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

fn pair_records<S, D>(
    shp: &mut ShpScanner<S>,
    dbf: &mut DbfScanner<D>,
    num_records: u32,
    tx: &SyncSender<Record>,
) -> Result<()>
where
    S: Read + Send + 'static,
    D: Read + Send + 'static,
{
    for index in 0..num_records {
        let shape = match shp.next_entry() {
            Some(ShpEntry::Shape(shape)) => Some(shape),
            Some(ShpEntry::Null(_)) => None,
            None => return Err(short_side(shp.err(), FileKind::Shp, num_records, index)),
        };
        let attributes = match dbf.record() {
            Some(record) => record,
            None => return Err(short_side(dbf.err(), FileKind::Dbf, num_records, index)),
        };

        let record = Record {
            shape,
            attributes,
            number: index + 1,
        };
        if !hand_off(tx, record) {
            tracing::debug!(record = index + 1, "shapefile consumer went away");
            return Ok(());
        }
    }

    // The .dbf worker stops after the declared count; wait for its end marker check.
    let dbf_err = match dbf.record() {
        Some(_) => Some(ShapefileError::Internal(format!(
            "dbf scanner produced a record past the declared count of {}",
            num_records
        ))),
        None => dbf.err().map(|err| err.in_file(FileKind::Dbf)),
    };

    let shp_err = drain_excess_shapes(shp, num_records);
    if let Some(err) = shp_err.or(dbf_err) {
        return Err(err);
    }

    tracing::debug!(records = num_records, "shapefile scan complete");
    Ok(())
}

/// Geometry left over after the paired records; only Null shapes may remain.
fn drain_excess_shapes<S>(shp: &mut ShpScanner<S>, num_records: u32) -> Option<ShapefileError>
where
    S: Read + Send + 'static,
{
    while let Some(entry) = shp.next_entry() {
        match entry {
            ShpEntry::Null(number) => {
                tracing::debug!(record = number, "ignoring trailing null shape")
            }
            ShpEntry::Shape(_) => {
                return Some(ShapefileError::ExcessRecords {
                    file: FileKind::Shp,
                    expected: num_records,
                })
            }
        }
    }
    shp.err().map(|err| err.in_file(FileKind::Shp))
}

fn short_side(err: Option<ShapefileError>, file: FileKind, expected: u32, read: u32) -> ShapefileError {
    match err {
        Some(err) => err.in_file(file),
        None => ShapefileError::CountMismatch {
            file,
            expected,
            read,
        },
    }
}
