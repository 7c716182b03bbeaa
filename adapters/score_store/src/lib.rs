#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Append-only persistence for completed session results.
//!
//! Records are never updated or deleted. Every store hands out identifiers
//! that increase monotonically in insertion order.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{Local, NaiveDateTime};
use enemy_down_core::{NewScoreRecord, ScoreRecord};
use thiserror::Error;

/// Timestamp layout used when rendering records for players.
pub const LISTING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Failures raised while reading or appending records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("score store I/O failed: {0}")]
    Io(#[from] io::Error),
    /// A stored line is not a valid record.
    #[error("score store line {line} is corrupt: {source}")]
    Corrupt {
        /// One-based line number of the offending entry.
        line: usize,
        /// Decoder failure.
        source: serde_json::Error,
    },
    /// A record could not be encoded.
    #[error("failed to encode score record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Ordering applied when listing stored records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListingOrder {
    /// Insertion order.
    #[default]
    Id,
    /// Highest score first; ties keep insertion order.
    ScoreDescending,
    /// Oldest registration first; ties keep insertion order.
    RegisteredAt,
}

/// Append-only collection of score records.
pub trait ScoreStore: Send + Sync {
    /// Persists a record, assigning its identifier and, when absent, its registration time.
    fn insert(&self, record: NewScoreRecord) -> Result<ScoreRecord, StoreError>;

    /// Every stored record in insertion order.
    fn select_all(&self) -> Result<Vec<ScoreRecord>, StoreError>;

    /// Every stored record in the requested order.
    fn select_ordered(&self, order: ListingOrder) -> Result<Vec<ScoreRecord>, StoreError> {
        let mut records = self.select_all()?;
        match order {
            ListingOrder::Id => records.sort_by_key(|record| record.id),
            ListingOrder::ScoreDescending => {
                records.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
            }
            ListingOrder::RegisteredAt => {
                records.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then(a.id.cmp(&b.id)));
            }
        }
        Ok(records)
    }
}

/// Renders a record as `id | name | score | difficulty | yyyy-MM-dd HH:mm:ss`.
#[must_use]
pub fn format_listing(record: &ScoreRecord) -> String {
    format!(
        "{} | {} | {} | {} | {}",
        record.id,
        record.player_name,
        record.score,
        record.difficulty,
        record.registered_at.format(LISTING_TIME_FORMAT)
    )
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn complete(id: u64, record: NewScoreRecord) -> ScoreRecord {
    ScoreRecord {
        id,
        player_name: record.player_name,
        score: record.score,
        difficulty: record.difficulty,
        registered_at: record.registered_at.unwrap_or_else(now),
    }
}

/// Volatile store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    records: Mutex<Vec<ScoreRecord>>,
}

impl MemoryScoreStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<ScoreRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScoreStore for MemoryScoreStore {
    fn insert(&self, record: NewScoreRecord) -> Result<ScoreRecord, StoreError> {
        let mut records = self.records();
        let id = records.last().map_or(1, |last| last.id + 1);
        let record = complete(id, record);
        records.push(record.clone());
        Ok(record)
    }

    fn select_all(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.records().clone())
    }
}

/// Durable store appending one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesScoreStore {
    path: PathBuf,
    next_id: Mutex<u64>,
}

impl JsonLinesScoreStore {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// An existing file is scanned so that new identifiers continue after the
    /// largest stored one.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let next_id = read_records(&path)?
            .iter()
            .map(|record| record.id)
            .max()
            .map_or(1, |id| id + 1);
        log::debug!("opened score store {} (next id {next_id})", path.display());

        Ok(Self {
            path,
            next_id: Mutex::new(next_id),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreStore for JsonLinesScoreStore {
    fn insert(&self, record: NewScoreRecord) -> Result<ScoreRecord, StoreError> {
        let mut next_id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        let record = complete(*next_id, record);
        let mut line = serde_json::to_vec(&record).map_err(StoreError::Serialize)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        repair_tail(&mut file, &self.path)?;
        file.write_all(&line)?;
        file.flush()?;

        *next_id += 1;
        Ok(record)
    }

    fn select_all(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        let _guard = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        read_records(&self.path)
    }
}

/// Makes sure the file ends with a newline before the next append.
///
/// An unterminated tail left by an interrupted write is truncated away; a
/// complete record that only lacks its newline gets one.
fn repair_tail(file: &mut File, path: &Path) -> io::Result<()> {
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    let mut last = [0; 1];
    let _ = file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut contents = Vec::new();
    let _ = file.seek(SeekFrom::Start(0))?;
    let _ = file.read_to_end(&mut contents)?;
    let keep = contents
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |index| index + 1);
    if serde_json::from_slice::<ScoreRecord>(&contents[keep..]).is_ok() {
        return file.write_all(b"\n");
    }
    log::warn!(
        "discarding {} bytes of an interrupted write at the end of {}",
        contents.len() - keep,
        path.display()
    );
    file.set_len(keep as u64)
}

fn read_records(path: &Path) -> Result<Vec<ScoreRecord>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error.into()),
    };

    let mut records = Vec::new();
    for (index, line) in contents.split_inclusive('\n').enumerate() {
        let terminated = line.ends_with('\n');
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(source) if !terminated => {
                log::warn!(
                    "ignoring unterminated line {} of {}: {source}",
                    index + 1,
                    path.display()
                );
            }
            Err(source) => {
                return Err(StoreError::Corrupt {
                    line: index + 1,
                    source,
                })
            }
        }
    }
    Ok(records)
}
