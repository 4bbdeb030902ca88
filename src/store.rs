//! Append-only reading store.
//!
//! The store owns the id sequence: [`RecordStore::append`] assigns
//! `next_id()` and writes the row in one `&mut self` call, so a store shared
//! behind a mutex can never hand out the same id twice. The CSV store also
//! serialises appends across processes with a file lock. Restarting the
//! process recovers the sequence from the last stored row.
//!
//! The on-disk layout is a headed CSV file:
//!
//! ```text
//! id,timestamp,suhu,kelembapan,label_suhu_kelembapan,mq135,label_kualitas_udara
//! 1,2025-03-26 18:45:00,25.4,55.0,nyaman,420,sangat_baik
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fd_lock::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::{parse_timestamp, Observation, Reading, TIMESTAMP_FORMAT};
use crate::StoreError;

// ---

/// Column header of the reading file.
pub const CSV_HEADER: [&str; 7] = [
    "id",
    "timestamp",
    "suhu",
    "kelembapan",
    "label_suhu_kelembapan",
    "mq135",
    "label_kualitas_udara",
];

pub trait RecordStore {
    /// Store one observation under the next id and return the stored reading.
    fn append(&mut self, observation: Observation) -> Result<Reading, StoreError>;

    /// Every valid reading, sorted by timestamp ascending.
    fn load_all(&self) -> Result<Vec<Reading>, StoreError>;

    /// Id the next `append` will assign. `1` for an empty store.
    fn next_id(&self) -> u64;
}

/// A store shared between the HTTP handlers, the scheduler and ingestion.
pub type SharedStore = Arc<Mutex<dyn RecordStore + Send>>;

pub fn shared<S: RecordStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

// ---

/// Row layout on disk. Labels are written but not read back.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: String,
    timestamp: String,
    suhu: String,
    kelembapan: String,
    label_suhu_kelembapan: String,
    mq135: String,
    label_kualitas_udara: String,
}

impl CsvRow {
    fn from_observation(id: u64, obs: &Observation) -> Self {
        CsvRow {
            id: id.to_string(),
            timestamp: obs.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            suhu: obs.temperature.to_string(),
            kelembapan: obs.humidity.to_string(),
            label_suhu_kelembapan: obs.comfort.to_string(),
            mq135: obs.air_quality_index.to_string(),
            label_kualitas_udara: obs.air_quality.to_string(),
        }
    }

    fn to_reading(&self) -> Option<Reading> {
        // ---
        Some(Reading {
            id: self.id.trim().parse().ok()?,
            timestamp: parse_timestamp(&self.timestamp)?,
            temperature: self.suhu.trim().parse().ok()?,
            humidity: self.kelembapan.trim().parse().ok()?,
            air_quality_index: self.mq135.trim().parse().ok()?,
        })
    }
}

/// Reading store backed by a CSV file.
///
/// Every append takes an exclusive advisory lock on the file and, when the
/// file changed since this handle last wrote, re-reads the last id under
/// that lock. Separate processes appending to the same path (the HTTP
/// service and a stdin bridge, say) therefore never reuse an id.
#[derive(Debug)]
pub struct CsvRecordStore {
    path: PathBuf,
    next_id: u64,
    /// File length right after this handle's last write.
    synced_len: Option<u64>,
}

impl CsvRecordStore {
    /// Open (without creating) the file at `path` and recover the id sequence.
    ///
    /// An unreadable or malformed last row does not fail the open; the
    /// sequence restarts at 1 and a warning is logged.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        // ---
        let path = path.into();
        let next_id = recover_next_id(&path);

        tracing::debug!("Opened reading store {} (next id {})", path.display(), next_id);
        CsvRecordStore {
            path,
            next_id,
            synced_len: None,
        }
    }
}

fn recover_next_id(path: &Path) -> u64 {
    // ---
    match read_last_id(path) {
        Ok(Some(id)) => id + 1,
        Ok(None) => 1,
        Err(e) => {
            tracing::warn!(
                "Could not recover last id from {}: {} - starting at 1",
                path.display(),
                e
            );
            1
        }
    }
}

/// Id of the last row, or `None` when the file is missing or holds no rows.
fn read_last_id(path: &Path) -> Result<Option<u64>, StoreError> {
    // ---
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let lock = RwLock::new(file);
    let guard = lock.read()?;
    scan_last_id(&guard, path)
}

/// Scan `file` from its current position to the end for the last row's id.
fn scan_last_id(file: &File, path: &Path) -> Result<Option<u64>, StoreError> {
    // ---
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut last = None;
    for record in reader.records() {
        last = Some(record?);
    }

    let Some(record) = last else {
        return Ok(None);
    };

    match record.get(0).map(str::trim).map(str::parse::<u64>) {
        Some(Ok(id)) => Ok(Some(id)),
        _ => {
            tracing::warn!(
                "Last row of {} has no integer id ({:?}) - starting at 1",
                path.display(),
                record.get(0)
            );
            Ok(None)
        }
    }
}

impl RecordStore for CsvRecordStore {
    fn append(&mut self, observation: Observation) -> Result<Reading, StoreError> {
        // ---
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut lock = RwLock::new(file);
        let guard = lock.write()?;

        // Reads start at offset 0; appends always land at the end.
        let len = guard.metadata()?.len();
        if self.synced_len != Some(len) {
            self.next_id = scan_last_id(&guard, &self.path)?.map_or(1, |id| id + 1);
        }
        let id = self.next_id;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&*guard);
        if len == 0 {
            writer.write_record(CSV_HEADER)?;
        }
        writer.serialize(CsvRow::from_observation(id, &observation))?;
        writer.flush()?;
        drop(writer);

        self.next_id = id + 1;
        self.synced_len = Some(guard.metadata()?.len());
        Ok(observation.into_reading(id))
    }

    fn load_all(&self) -> Result<Vec<Reading>, StoreError> {
        // ---
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Reading store {} does not exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let lock = RwLock::new(file);
        let guard = lock.read()?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(BufReader::new(&*guard));

        let mut readings = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize::<CsvRow>() {
            match row {
                Ok(row) => match row.to_reading() {
                    Some(reading) => readings.push(reading),
                    None => skipped += 1,
                },
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    tracing::debug!("Malformed row in {}: {}", self.path.display(), e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} unparseable row(s) in {}",
                skipped,
                self.path.display()
            );
        }

        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    /// Re-read from the file, so appends by other handles are visible.
    fn next_id(&self) -> u64 {
        recover_next_id(&self.path)
    }
}

/// In-process store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    readings: Vec<Reading>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn append(&mut self, observation: Observation) -> Result<Reading, StoreError> {
        let reading = observation.into_reading(self.next_id());
        self.readings.push(reading.clone());
        Ok(reading)
    }

    fn load_all(&self) -> Result<Vec<Reading>, StoreError> {
        let mut readings = self.readings.clone();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    fn next_id(&self) -> u64 {
        self.readings.last().map_or(1, |r| r.id + 1)
    }
}
