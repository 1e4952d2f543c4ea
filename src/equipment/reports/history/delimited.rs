//! CSV representation of the price history, used when Parquet is unavailable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::equipment::reports::error::{ReportError, Result};
use crate::equipment::reports::history::{
    EQUIPMENT_COLUMN, HistoryBackend, PRICE_COLUMN, SOURCE_COLUMN, STORE_COLUMN,
    TIMESTAMP_COLUMN, legacy_column, temporary_path,
};
use crate::equipment::reports::model::HistoricalEntry;

/// Stores the history as a UTF-8 CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvBackend {
    path: PathBuf,
}

impl CsvBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryBackend for CsvBackend {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<HistoricalEntry>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let has_price = headers.iter().any(|header| {
            header == PRICE_COLUMN || legacy_column(PRICE_COLUMN) == Some(header)
        });
        if !has_price {
            return Err(ReportError::InvalidHistory(format!(
                "missing column '{PRICE_COLUMN}'"
            )));
        }

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
            // Line 1 is the header.
            let line = index + 2;
            match row {
                Ok(row) => match row.into_entry() {
                    Some(entry) => entries.push(entry),
                    None => skipped += 1,
                },
                Err(error) if matches!(error.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(error.into());
                }
                Err(error) => {
                    warn!(line, %error, "skipping unreadable history row");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!(
                path = %self.path.display(),
                skipped,
                "history rows without a usable price were ignored"
            );
        }
        Ok(entries)
    }

    fn write(&self, entries: &[HistoricalEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staging = temporary_path(&self.path);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_path(&staging)?;
        if entries.is_empty() {
            // serialize() only emits the header alongside the first record
            writer.write_record([
                STORE_COLUMN,
                EQUIPMENT_COLUMN,
                PRICE_COLUMN,
                SOURCE_COLUMN,
                TIMESTAMP_COLUMN,
            ])?;
        }
        for entry in entries {
            writer.serialize(entry)?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// One CSV line as stored; every cell may be blank.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Store", alias = "Loja", default)]
    store: String,
    #[serde(rename = "Equipment", alias = "Equipamento", default)]
    equipment: String,
    #[serde(
        rename = "RealizedPrice",
        alias = "PrecoReal",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    realized_price: Option<f64>,
    #[serde(rename = "SourceTag", alias = "Fonte", default)]
    source: String,
    #[serde(rename = "Timestamp", alias = "ts", default)]
    timestamp: String,
}

impl CsvRow {
    fn into_entry(self) -> Option<HistoricalEntry> {
        let price = self.realized_price.filter(|price| price.is_finite())?;
        Some(HistoricalEntry {
            store: self.store,
            equipment: self.equipment,
            realized_price: price,
            source: self.source,
            timestamp: self.timestamp,
        })
    }
}
