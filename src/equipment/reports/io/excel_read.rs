use std::collections::BTreeSet;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::{debug, info, instrument};

use crate::equipment::reports::error::{ReportError, Result};
use crate::equipment::reports::io::{
    INPUT_COLUMNS, INPUT_SHEET, InputColumn, LEGACY_INPUT_SHEET,
};
use crate::equipment::reports::model::{EquipmentRecord, RejectedRow, ValidatedBatch};

/// A cell interpreted as a number.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericCell {
    Empty,
    Number(f64),
    /// Text that could not be read as a number, kept for error messages.
    Invalid(String),
}

/// One data row of the input sheet before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based row number in the sheet.
    pub row: usize,
    pub store: String,
    pub equipment: String,
    pub quantity: NumericCell,
    pub suggested_price: NumericCell,
    pub realized_price: NumericCell,
    /// Cell text in [`INPUT_COLUMNS`] order.
    pub cells: Vec<String>,
}

/// Reads and validates the equipment sheet of the workbook at `path`.
///
/// `valid_stores` restricts the accepted store identifiers; `None` accepts
/// any non-empty store.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_batch(path: &Path, valid_stores: Option<&BTreeSet<String>>) -> Result<ValidatedBatch> {
    if !path.exists() {
        return Err(ReportError::MissingInput(path.to_path_buf()));
    }
    let rows = read_rows(path)?;
    let batch = validate_rows(rows, valid_stores);
    info!(
        valid = batch.valid.len(),
        rejected = batch.rejected.len(),
        "validated input sheet"
    );
    Ok(batch)
}

/// Reads the data rows of the equipment sheet without validating them.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let sheet_name = {
        let names = workbook.sheet_names();
        [INPUT_SHEET, LEGACY_INPUT_SHEET]
            .into_iter()
            .find(|candidate| names.iter().any(|name| name == candidate))
            .map(str::to_string)
            .or_else(|| names.first().cloned())
            .ok_or_else(|| ReportError::InvalidWorkbook("workbook has no sheets".into()))?
    };
    debug!(sheet = %sheet_name, "reading input sheet");

    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| ReportError::InvalidWorkbook(format!("missing sheet '{sheet_name}'")))?
        .map_err(ReportError::from)?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)).trim().to_string())
            .collect(),
        None => return Ok(Vec::new()),
    };
    let positions: Vec<Option<usize>> = INPUT_COLUMNS
        .iter()
        .map(|column| headers.iter().position(|header| column.matches(header)))
        .collect();

    let mut raw_rows = Vec::new();
    for (offset, row) in rows.enumerate() {
        let cell = |column: InputColumn| positions[column as usize].and_then(|idx| row.get(idx));

        let cells: Vec<String> = INPUT_COLUMNS
            .iter()
            .map(|column| cell_to_string(cell(*column)).trim().to_string())
            .collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }

        raw_rows.push(RawRow {
            // header is row 1
            row: offset + 2,
            store: cells[InputColumn::Store as usize].clone(),
            equipment: cells[InputColumn::Equipment as usize].clone(),
            quantity: cell_to_number(cell(InputColumn::Quantity)),
            suggested_price: cell_to_number(cell(InputColumn::SuggestedPrice)),
            realized_price: cell_to_number(cell(InputColumn::RealizedPrice)),
            cells,
        });
    }

    Ok(raw_rows)
}

/// Applies the business rules and splits rows into valid and rejected.
pub fn validate_rows(rows: Vec<RawRow>, valid_stores: Option<&BTreeSet<String>>) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();

    for raw in rows {
        let mut problems: Vec<String> = Vec::new();

        let store = raw.store.trim();
        if store.is_empty() {
            problems.push("Store missing".to_string());
        } else if let Some(stores) = valid_stores {
            if !stores.contains(store) {
                problems.push(format!("Store invalid ({store})"));
            }
        }

        let equipment = raw.equipment.trim();
        if equipment.is_empty() {
            problems.push("Equipment missing".to_string());
        }

        let quantity = match &raw.quantity {
            NumericCell::Empty => {
                problems.push("Quantity missing".to_string());
                None
            }
            NumericCell::Invalid(text) => {
                problems.push(format!("Quantity invalid ({text})"));
                None
            }
            NumericCell::Number(value) if value.fract() != 0.0 || *value > f64::from(u32::MAX) => {
                problems.push(format!("Quantity invalid ({value})"));
                None
            }
            NumericCell::Number(value) if *value < 1.0 => {
                problems.push(format!("Quantity < 1 ({value})"));
                None
            }
            NumericCell::Number(value) => Some(*value as u32),
        };

        let suggested_price = check_price("Suggested price", &raw.suggested_price, &mut problems);
        let realized_price = check_price("Realized price", &raw.realized_price, &mut problems);

        match quantity {
            Some(quantity) if problems.is_empty() => batch.valid.push(EquipmentRecord {
                store: store.to_string(),
                equipment: equipment.to_string(),
                quantity,
                suggested_price,
                realized_price,
            }),
            _ => batch.rejected.push(RejectedRow {
                row: raw.row,
                cells: raw.cells,
                reason: problems.join("; "),
            }),
        }
    }

    batch
}

fn check_price(label: &str, cell: &NumericCell, problems: &mut Vec<String>) -> Option<f64> {
    match cell {
        NumericCell::Empty => None,
        NumericCell::Invalid(text) => {
            problems.push(format!("{label} invalid ({text})"));
            None
        }
        NumericCell::Number(value) if *value < 0.0 => {
            problems.push(format!("{label} negative ({value})"));
            None
        }
        NumericCell::Number(value) => Some(*value),
    }
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn cell_to_number(cell: Option<&DataType>) -> NumericCell {
    match cell {
        Some(DataType::Float(value)) if value.is_finite() => NumericCell::Number(*value),
        Some(DataType::Int(value)) => NumericCell::Number(*value as f64),
        Some(DataType::Empty) | None => NumericCell::Empty,
        other => parse_number(&cell_to_string(other)),
    }
}

/// Parses typed-in numbers, accepting a decimal comma.
fn parse_number(text: &str) -> NumericCell {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return NumericCell::Empty;
    }
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => NumericCell::Number(value),
        _ => NumericCell::Invalid(trimmed.to_string()),
    }
}
