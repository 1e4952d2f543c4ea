//! Parquet representation of the price history.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Float64Builder, StringArray, StringBuilder};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::warn;

use crate::equipment::reports::error::{ReportError, Result};
use crate::equipment::reports::history::{
    EQUIPMENT_COLUMN, HistoryBackend, PRICE_COLUMN, SOURCE_COLUMN, STORE_COLUMN,
    TIMESTAMP_COLUMN, legacy_column, temporary_path,
};
use crate::equipment::reports::model::HistoricalEntry;

/// Stores the history as a single Snappy-compressed Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetBackend {
    path: PathBuf,
}

impl ParquetBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new(STORE_COLUMN, DataType::Utf8, false),
            Field::new(EQUIPMENT_COLUMN, DataType::Utf8, false),
            Field::new(PRICE_COLUMN, DataType::Float64, false),
            Field::new(SOURCE_COLUMN, DataType::Utf8, false),
            Field::new(TIMESTAMP_COLUMN, DataType::Utf8, false),
        ])
    }

    fn build_batch(schema: Arc<Schema>, entries: &[HistoricalEntry]) -> Result<RecordBatch> {
        let rows = entries.len();
        let mut stores = StringBuilder::with_capacity(rows, rows * 8);
        let mut equipment = StringBuilder::with_capacity(rows, rows * 24);
        let mut prices = Float64Builder::with_capacity(rows);
        let mut sources = StringBuilder::with_capacity(rows, rows * 16);
        let mut timestamps = StringBuilder::with_capacity(rows, rows * 26);

        for entry in entries {
            stores.append_value(&entry.store);
            equipment.append_value(&entry.equipment);
            prices.append_value(entry.realized_price);
            sources.append_value(&entry.source);
            timestamps.append_value(&entry.timestamp);
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(stores.finish()),
            Arc::new(equipment.finish()),
            Arc::new(prices.finish()),
            Arc::new(sources.finish()),
            Arc::new(timestamps.finish()),
        ];
        Ok(RecordBatch::try_new(schema, columns)?)
    }
}

impl HistoryBackend for ParquetBackend {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<HistoricalEntry>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut entries = Vec::new();
        for batch in reader {
            let batch = batch?;
            entries.extend(entries_from_batch(&batch)?);
        }
        Ok(entries)
    }

    fn write(&self, entries: &[HistoricalEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let schema = Arc::new(Self::schema());
        let batch = Self::build_batch(schema.clone(), entries)?;
        let staging = temporary_path(&self.path);
        let file = File::create(&staging)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

fn entries_from_batch(batch: &RecordBatch) -> Result<Vec<HistoricalEntry>> {
    let stores = text_column(batch, STORE_COLUMN)?;
    let equipment = text_column(batch, EQUIPMENT_COLUMN)?;
    let prices = price_column(batch)?;
    let sources = text_column(batch, SOURCE_COLUMN)?;
    let timestamps = text_column(batch, TIMESTAMP_COLUMN)?;

    let text = |array: &StringArray, row: usize| {
        if array.is_null(row) {
            String::new()
        } else {
            array.value(row).to_string()
        }
    };

    let mut entries = Vec::with_capacity(batch.num_rows());
    let mut skipped = 0usize;
    for row in 0..batch.num_rows() {
        // Rows without a price carry nothing the estimator can use.
        if prices.is_null(row) || !prices.value(row).is_finite() {
            skipped += 1;
            continue;
        }
        entries.push(HistoricalEntry {
            store: text(&stores, row),
            equipment: text(&equipment, row),
            realized_price: prices.value(row),
            source: text(&sources, row),
            timestamp: text(&timestamps, row),
        });
    }
    if skipped > 0 {
        warn!(skipped, "history rows without a usable price were ignored");
    }
    Ok(entries)
}

fn find_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .or_else(|| legacy_column(name).and_then(|legacy| batch.column_by_name(legacy)))
        .ok_or_else(|| ReportError::InvalidHistory(format!("missing column '{name}'")))
}

fn text_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let column = cast(find_column(batch, name)?, &DataType::Utf8)?;
    column
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| ReportError::InvalidHistory(format!("column '{name}' is not text")))
}

fn price_column(batch: &RecordBatch) -> Result<Float64Array> {
    let column = cast(find_column(batch, PRICE_COLUMN)?, &DataType::Float64)?;
    column
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| {
            ReportError::InvalidHistory(format!("column '{PRICE_COLUMN}' is not numeric"))
        })
}
