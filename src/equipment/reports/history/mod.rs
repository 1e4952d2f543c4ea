//! Durable record of realized prices keyed by (store, equipment).
//!
//! The history is persisted as Parquet when possible and as CSV otherwise.
//! [`PriceHistory`] hides that choice from callers: loading never fails (a
//! missing or unreadable history is simply empty) and saving falls back to the
//! secondary representation when the primary one cannot be written. Files
//! left by older releases under their previous names are read as a last
//! resort and replaced by the current names on the next save.
//!
//! The store assumes a single writer. Two processes appending at the same time
//! may lose each other's entries.

pub mod columnar;
pub mod delimited;

use std::fs;
use std::io::ErrorKind;
use std::iter;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use crate::equipment::reports::config::ReportConfig;
use crate::equipment::reports::error::Result;
use crate::equipment::reports::model::{EquipmentRecord, HistoricalEntry};

pub use columnar::ParquetBackend;
pub use delimited::CsvBackend;

pub const STORE_COLUMN: &str = "Store";
pub const EQUIPMENT_COLUMN: &str = "Equipment";
pub const PRICE_COLUMN: &str = "RealizedPrice";
pub const SOURCE_COLUMN: &str = "SourceTag";
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Provenance tag attached to entries appended from the current input file.
pub const CURRENT_INPUT_SOURCE: &str = "current-input";

/// Format of timestamps written by [`PriceHistory::append`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One on-disk representation of the history.
pub trait HistoryBackend {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    /// Location of the backing file.
    fn path(&self) -> &Path;

    /// Reads every entry in stored order.
    fn read(&self) -> Result<Vec<HistoricalEntry>>;

    /// Replaces the stored entries.
    fn write(&self, entries: &[HistoricalEntry]) -> Result<()>;
}

/// Storage port over a primary and a fallback [`HistoryBackend`].
pub struct PriceHistory {
    primary: Box<dyn HistoryBackend>,
    fallback: Box<dyn HistoryBackend>,
    /// Read-only locations tried after both current files.
    legacy: Vec<Box<dyn HistoryBackend>>,
    capacity: usize,
}

impl PriceHistory {
    /// Opens the history stored under the configured base directory.
    pub fn open(config: &ReportConfig) -> Self {
        Self::with_backends(
            Box::new(ParquetBackend::new(config.history_parquet_path())),
            Box::new(CsvBackend::new(config.history_csv_path())),
            config.history_capacity(),
        )
        .with_legacy_backends(vec![
            Box::new(ParquetBackend::new(config.legacy_history_parquet_path())),
            Box::new(CsvBackend::new(config.legacy_history_csv_path())),
        ])
    }

    pub fn with_backends(
        primary: Box<dyn HistoryBackend>,
        fallback: Box<dyn HistoryBackend>,
        capacity: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            legacy: Vec::new(),
            capacity,
        }
    }

    /// Adds read-only backends consulted when neither current file loads.
    pub fn with_legacy_backends(mut self, legacy: Vec<Box<dyn HistoryBackend>>) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Loads all entries, trying the primary representation first.
    ///
    /// Any failure degrades to the next representation and finally to an
    /// empty history.
    pub fn load(&self) -> Vec<HistoricalEntry> {
        let candidates = iter::once(&self.primary)
            .chain(iter::once(&self.fallback))
            .chain(self.legacy.iter());
        for backend in candidates {
            if !backend.path().exists() {
                debug!(backend = backend.name(), "history file absent");
                continue;
            }
            match backend.read() {
                Ok(entries) => {
                    debug!(
                        backend = backend.name(),
                        entry_count = entries.len(),
                        "loaded price history"
                    );
                    return entries;
                }
                Err(error) => {
                    warn!(
                        backend = backend.name(),
                        path = %backend.path().display(),
                        %error,
                        "unreadable price history, trying next representation"
                    );
                }
            }
        }
        Vec::new()
    }

    /// Trims the entries to the retention cap and persists them.
    ///
    /// Returns the number of entries written.
    pub fn save(&self, entries: Vec<HistoricalEntry>) -> Result<usize> {
        let entries = retain_latest(entries, self.capacity);

        match self.primary.write(&entries) {
            Ok(()) => {
                debug!(
                    backend = self.primary.name(),
                    entry_count = entries.len(),
                    "saved price history"
                );
            }
            Err(error) => {
                warn!(
                    backend = self.primary.name(),
                    %error,
                    "could not write price history, using fallback"
                );
                // A stale primary file would shadow the fallback on the next load.
                remove_stale(self.primary.path());
                self.fallback.write(&entries)?;
                debug!(
                    backend = self.fallback.name(),
                    entry_count = entries.len(),
                    "saved price history"
                );
            }
        }

        Ok(entries.len())
    }

    /// Appends the realized prices of a validated batch.
    ///
    /// Only rows with a realized price above zero are recorded. Returns the
    /// number of appended entries; no file is touched when that number is zero.
    #[instrument(level = "info", skip_all, fields(row_count = records.len()))]
    pub fn append(&self, records: &[EquipmentRecord]) -> Result<usize> {
        let qualifying: Vec<(&EquipmentRecord, f64)> = records
            .iter()
            .filter_map(|record| match record.realized_price {
                Some(price) if price > 0.0 => Some((record, price)),
                _ => None,
            })
            .collect();

        if qualifying.is_empty() {
            debug!("no realized prices to record");
            return Ok(0);
        }

        let mut history = self.load();
        let timestamp = batch_timestamp(&history);
        let appended = qualifying.len();
        history.extend(qualifying.into_iter().map(|(record, price)| HistoricalEntry {
            store: record.store.trim().to_string(),
            equipment: record.equipment.trim().to_string(),
            realized_price: price,
            source: CURRENT_INPUT_SOURCE.to_string(),
            timestamp: timestamp.clone(),
        }));

        let kept = self.save(history)?;
        info!(appended, kept, "price history updated");
        Ok(appended)
    }
}

/// Keeps the last `capacity` entries, dropping from the front.
pub fn retain_latest(mut entries: Vec<HistoricalEntry>, capacity: usize) -> Vec<HistoricalEntry> {
    if entries.len() > capacity {
        let excess = entries.len() - capacity;
        entries.drain(..excess);
        debug!(dropped = excess, "trimmed price history");
    }
    entries
}

/// Current local time, never earlier than the newest stored timestamp.
fn batch_timestamp(existing: &[HistoricalEntry]) -> String {
    let now = Local::now().naive_local();
    let latest = existing.last().and_then(|entry| {
        NaiveDateTime::parse_from_str(&entry.timestamp, "%Y-%m-%dT%H:%M:%S%.f").ok()
    });
    let stamp = match latest {
        Some(latest) if latest > now => latest,
        _ => now,
    };
    stamp.format(TIMESTAMP_FORMAT).to_string()
}

fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale history file"),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => warn!(path = %path.display(), %error, "could not remove stale history file"),
    }
}

/// Column names used by older history files.
pub(crate) fn legacy_column(name: &str) -> Option<&'static str> {
    match name {
        STORE_COLUMN => Some("Loja"),
        EQUIPMENT_COLUMN => Some("Equipamento"),
        PRICE_COLUMN => Some("PrecoReal"),
        SOURCE_COLUMN => Some("Fonte"),
        TIMESTAMP_COLUMN => Some("ts"),
        _ => None,
    }
}

/// Sibling path used to stage a write before renaming it into place.
pub(crate) fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
