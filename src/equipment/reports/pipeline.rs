use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::equipment::reports::config::ReportConfig;
use crate::equipment::reports::error::Result;
use crate::equipment::reports::history::PriceHistory;
use crate::equipment::reports::io::{excel_read, excel_write, pdf_write};
use crate::equipment::reports::model::{
    EquipmentRecord, PriceField, PricedRecord, StoreId, ValidatedBatch, group_by_store,
};
use crate::equipment::reports::pricing::apply_suggested_prices;
use crate::equipment::reports::report::{StoreReport, build_store_reports, safe_file_stem};

const REJECTIONS_FILE: &str = "validation_errors.xlsx";
const SUMMARY_FILE: &str = "store_summary.xlsx";
const TEMPLATE_FILE: &str = "equipment_template.xlsx";

/// Folder under `output/` that receives PDF reports unless told otherwise.
pub const DEFAULT_PDF_DIR: &str = "pdf";

/// Equipment names offered in the template's helper list.
const STARTER_EQUIPMENT: [&str; 5] = ["Notebook", "Printer", "Monitor", "Router", "UPS"];

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    /// Every row was rejected.
    ValidationError,
    /// The sheet had no data rows.
    Empty,
}

/// Optional outputs of a `process` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Folder under `output/` for per-store PDFs; `None` skips them.
    pub pdf_dir: Option<String>,
}

impl ProcessOptions {
    /// Also writes PDFs into `output/<dir>`.
    pub fn with_pdf(dir: impl Into<String>) -> Self {
        Self {
            pdf_dir: Some(dir.into()),
        }
    }
}

/// What a full `process` run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub status: RunStatus,
    pub store_reports: Vec<PathBuf>,
    pub pdf_reports: Vec<PathBuf>,
    pub summary_path: Option<PathBuf>,
    pub errors_path: Option<PathBuf>,
    pub history_appended: usize,
}

/// Result of the `validate` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub valid_rows: usize,
    pub rejected_rows: usize,
    pub stores: Vec<StoreId>,
    pub errors_path: Option<PathBuf>,
}

/// Reads the input sheet and writes the rejection log when needed.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn load_batch(config: &ReportConfig, input: &Path) -> Result<(ValidatedBatch, Option<PathBuf>)> {
    let stores = config.load_valid_stores()?;
    let batch = excel_read::read_batch(input, stores.as_ref())?;

    let errors_path = if batch.rejected.is_empty() {
        None
    } else {
        let path = config.logs_dir().join(REJECTIONS_FILE);
        excel_write::write_rejections(&path, &batch.rejected)?;
        warn!(
            rejected = batch.rejected.len(),
            path = %path.display(),
            "some rows failed validation"
        );
        Some(path)
    };

    Ok((batch, errors_path))
}

/// Fills missing suggested prices across the whole batch using the stored
/// history.
///
/// Records are priced together before they are split by store, so the
/// batch-wide medians draw on every store's rows for the same equipment.
pub fn price_batch(config: &ReportConfig, records: &[EquipmentRecord]) -> Vec<PricedRecord> {
    let history = PriceHistory::open(config).load();
    debug!(history_entries = history.len(), "history loaded for pricing");
    apply_suggested_prices(records, &history, PriceField::Suggested)
}

/// Validates the input and reports what was found.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn validate(config: &ReportConfig, input: &Path) -> Result<ValidationOutcome> {
    let (batch, errors_path) = load_batch(config, input)?;
    Ok(ValidationOutcome {
        valid_rows: batch.valid.len(),
        rejected_rows: batch.rejected.len(),
        stores: batch.by_store().into_keys().collect(),
        errors_path,
    })
}

/// Runs the full pipeline: validation, pricing, store workbooks, summary and
/// history update.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn process(
    config: &ReportConfig,
    input: &Path,
    options: &ProcessOptions,
) -> Result<ProcessOutcome> {
    let (batch, errors_path) = load_batch(config, input)?;
    if batch.valid.is_empty() {
        return Ok(ProcessOutcome {
            status: empty_status(&batch),
            store_reports: Vec::new(),
            pdf_reports: Vec::new(),
            summary_path: None,
            errors_path,
            history_appended: 0,
        });
    }

    let reports = priced_reports(config, &batch.valid);
    let store_reports = write_store_reports(config, &reports)?;
    let summary_path = write_summary(config, &reports)?;
    let pdf_reports = match &options.pdf_dir {
        Some(dir) => write_store_pdfs(config, &reports, dir)?,
        None => Vec::new(),
    };

    let history_appended = match PriceHistory::open(config).append(&batch.valid) {
        Ok(count) => count,
        Err(error) => {
            warn!(%error, "price history not updated");
            0
        }
    };

    info!(
        stores = store_reports.len(),
        pdfs = pdf_reports.len(),
        history_appended,
        "processing finished"
    );
    Ok(ProcessOutcome {
        status: RunStatus::Ok,
        store_reports,
        pdf_reports,
        summary_path: Some(summary_path),
        errors_path,
        history_appended,
    })
}

/// Writes only the per-store workbooks. History is not updated.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn store_reports(config: &ReportConfig, input: &Path) -> Result<Vec<PathBuf>> {
    let (batch, _) = load_batch(config, input)?;
    if batch.valid.is_empty() {
        info!("no valid rows, nothing to report");
        return Ok(Vec::new());
    }
    let reports = priced_reports(config, &batch.valid);
    write_store_reports(config, &reports)
}

/// Writes only the per-store PDFs into `output/<pdf_dir>`. History is not
/// updated.
#[instrument(level = "info", skip_all, fields(input = %input.display(), pdf_dir = pdf_dir))]
pub fn pdf_reports(config: &ReportConfig, input: &Path, pdf_dir: &str) -> Result<Vec<PathBuf>> {
    let (batch, _) = load_batch(config, input)?;
    if batch.valid.is_empty() {
        info!("no valid rows, nothing to report");
        return Ok(Vec::new());
    }
    let reports = priced_reports(config, &batch.valid);
    write_store_pdfs(config, &reports, pdf_dir)
}

/// Writes only the consolidated summary. History is not updated.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn summary(config: &ReportConfig, input: &Path) -> Result<Option<PathBuf>> {
    let (batch, _) = load_batch(config, input)?;
    if batch.valid.is_empty() {
        info!("no valid rows, nothing to summarise");
        return Ok(None);
    }
    let reports = priced_reports(config, &batch.valid);
    write_summary(config, &reports).map(Some)
}

/// Returns the priced rows, including the raw estimate, without writing
/// anything besides the rejection log.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn suggest(config: &ReportConfig, input: &Path) -> Result<Vec<PricedRecord>> {
    let (batch, _) = load_batch(config, input)?;
    Ok(price_batch(config, &batch.valid))
}

/// Creates the folder layout and an empty input template.
#[instrument(level = "info", skip_all, fields(base = %config.base_dir().display()))]
pub fn create_template(config: &ReportConfig) -> Result<PathBuf> {
    for dir in [
        config.input_dir(),
        config.output_dir(),
        config.logs_dir(),
        config.config_dir(),
    ] {
        fs::create_dir_all(&dir)?;
    }

    let stores: Vec<String> = config
        .load_valid_stores()?
        .map(|stores| stores.into_iter().collect())
        .unwrap_or_default();
    let path = config.input_dir().join(TEMPLATE_FILE);
    excel_write::write_template(&path, &stores, &STARTER_EQUIPMENT)?;
    info!(path = %path.display(), "template written");
    Ok(path)
}

/// Path of the workbook generated for `store`.
pub fn store_report_path(config: &ReportConfig, store: &str) -> PathBuf {
    config
        .output_dir()
        .join(format!("store_report_{}.xlsx", safe_file_stem(store)))
}

/// Path of the PDF generated for `store` inside `output/<pdf_dir>`.
pub fn store_pdf_path(config: &ReportConfig, pdf_dir: &str, store: &str) -> PathBuf {
    config
        .output_dir()
        .join(pdf_dir)
        .join(format!("store_report_{}.pdf", safe_file_stem(store)))
}

/// Path of the consolidated summary workbook.
pub fn summary_path(config: &ReportConfig) -> PathBuf {
    config.output_dir().join(SUMMARY_FILE)
}

fn priced_reports(config: &ReportConfig, records: &[EquipmentRecord]) -> Vec<StoreReport> {
    let priced = price_batch(config, records);
    let groups = group_by_store(
        priced.into_iter().map(|priced| priced.record),
        |record| record.store.clone(),
    );
    build_store_reports(&groups)
}

fn write_store_reports(config: &ReportConfig, reports: &[StoreReport]) -> Result<Vec<PathBuf>> {
    let generated_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
    let mut paths = Vec::with_capacity(reports.len());
    for report in reports {
        let path = store_report_path(config, &report.totals.store);
        excel_write::write_store_report(&path, report, &generated_at)?;
        debug!(store = %report.totals.store, path = %path.display(), "store report written");
        paths.push(path);
    }
    Ok(paths)
}

fn write_store_pdfs(
    config: &ReportConfig,
    reports: &[StoreReport],
    pdf_dir: &str,
) -> Result<Vec<PathBuf>> {
    let generated_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
    let mut paths = Vec::with_capacity(reports.len());
    for report in reports {
        let path = store_pdf_path(config, pdf_dir, &report.totals.store);
        pdf_write::write_store_pdf(&path, report, &generated_at)?;
        debug!(store = %report.totals.store, path = %path.display(), "store PDF written");
        paths.push(path);
    }
    Ok(paths)
}

fn write_summary(config: &ReportConfig, reports: &[StoreReport]) -> Result<PathBuf> {
    let totals: Vec<_> = reports.iter().map(|report| report.totals.clone()).collect();
    let path = summary_path(config);
    excel_write::write_summary(&path, &totals)?;
    debug!(path = %path.display(), "summary written");
    Ok(path)
}

fn empty_status(batch: &ValidatedBatch) -> RunStatus {
    if batch.rejected.is_empty() {
        RunStatus::Empty
    } else {
        RunStatus::ValidationError
    }
}
