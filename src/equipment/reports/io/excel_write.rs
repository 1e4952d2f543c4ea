use std::fs;
use std::path::Path;

use rust_xlsxwriter::{
    Color, ConditionalFormatCell, ConditionalFormatCellRule, Format, FormatBorder, Table,
    TableColumn, Workbook, Worksheet,
};

use crate::equipment::reports::error::Result;
use crate::equipment::reports::io::{INPUT_COLUMNS, INPUT_SHEET};
use crate::equipment::reports::model::RejectedRow;
use crate::equipment::reports::report::{StoreReport, StoreTotals};

const ITEMS_SHEET: &str = "Items";
const SUMMARY_SHEET: &str = "Summary";
const ERRORS_SHEET: &str = "Errors";

const MONEY_FORMAT: &str = "R$ #,##0.00";
const PERCENT_FORMAT: &str = "0.00%";
const INTEGER_FORMAT: &str = "0";

const ITEM_COLUMNS: [&str; 8] = [
    "Equipment",
    "Quantity",
    "Suggested price",
    "Realized price",
    "Suggested total",
    "Realized total",
    "Difference",
    "Difference (%)",
];

const SUMMARY_COLUMNS: [&str; 7] = [
    "Store",
    "Items",
    "Total quantity",
    "Suggested total",
    "Realized total",
    "Difference",
    "Difference (%)",
];

/// Shared cell formats.
struct Styles {
    header: Format,
    money: Format,
    percent: Format,
    integer: Format,
    loss: Format,
}

impl Styles {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0xF2F2F2))
                .set_border(FormatBorder::Thin),
            money: Format::new().set_num_format(MONEY_FORMAT),
            percent: Format::new().set_num_format(PERCENT_FORMAT),
            integer: Format::new().set_num_format(INTEGER_FORMAT),
            loss: Format::new().set_font_color(Color::RGB(0x9C0006)),
        }
    }
}

/// Writes the workbook for one store with an `Items` and a `Summary` sheet.
pub fn write_store_report(path: &Path, report: &StoreReport, generated_at: &str) -> Result<()> {
    ensure_parent(path)?;
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    let items = workbook.add_worksheet();
    items.set_name(ITEMS_SHEET)?;
    write_headers(items, &ITEM_COLUMNS, &styles)?;
    for (idx, line) in report.lines.iter().enumerate() {
        let row = (idx + 1) as u32;
        items.write_string(row, 0, &line.equipment)?;
        items.write_number_with_format(row, 1, f64::from(line.quantity), &styles.integer)?;
        write_optional(items, row, 2, line.suggested_price, &styles.money)?;
        write_optional(items, row, 3, line.realized_price, &styles.money)?;
        items.write_number_with_format(row, 4, line.suggested_total, &styles.money)?;
        items.write_number_with_format(row, 5, line.realized_total, &styles.money)?;
        items.write_number_with_format(row, 6, line.difference, &styles.money)?;
        write_optional(items, row, 7, line.difference_ratio, &styles.percent)?;
    }
    if !report.lines.is_empty() {
        let negative = ConditionalFormatCell::new()
            .set_rule(ConditionalFormatCellRule::LessThan(0))
            .set_format(&styles.loss);
        items.add_conditional_format(1, 6, report.lines.len() as u32, 6, &negative)?;
    }
    items.set_column_width(0, 28.0)?;
    items.set_column_width(1, 12.0)?;
    for col in 2..=6 {
        items.set_column_width(col, 16.0)?;
    }
    items.set_column_width(7, 14.0)?;

    let summary = workbook.add_worksheet();
    summary.set_name(SUMMARY_SHEET)?;
    write_headers(summary, &["Metric", "Value"], &styles)?;
    let totals = &report.totals;
    let metrics: [(&str, Option<f64>, &Format); 6] = [
        ("Items", Some(totals.items as f64), &styles.integer),
        ("Total quantity", Some(totals.total_quantity as f64), &styles.integer),
        ("Suggested total", Some(totals.suggested_total), &styles.money),
        ("Realized total", Some(totals.realized_total), &styles.money),
        ("Difference", Some(totals.difference), &styles.money),
        ("Difference (%)", totals.difference_ratio, &styles.percent),
    ];
    for (idx, (label, value, format)) in metrics.into_iter().enumerate() {
        let row = (idx + 1) as u32;
        summary.write_string(row, 0, label)?;
        write_optional(summary, row, 1, value, format)?;
    }
    summary.write_string(0, 3, "Store:")?;
    summary.write_string(0, 4, &totals.store)?;
    summary.write_string(1, 3, "Generated at:")?;
    summary.write_string(1, 4, generated_at)?;
    summary.set_column_width(0, 20.0)?;
    summary.set_column_width(1, 20.0)?;

    workbook.save(path)?;
    Ok(())
}

/// Writes the consolidated one-row-per-store summary.
pub fn write_summary(path: &Path, totals: &[StoreTotals]) -> Result<()> {
    ensure_parent(path)?;
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SUMMARY_SHEET)?;
    write_headers(sheet, &SUMMARY_COLUMNS, &styles)?;

    let mut ordered: Vec<&StoreTotals> = totals.iter().collect();
    ordered.sort_by(|lhs, rhs| lhs.store.cmp(&rhs.store));
    for (idx, store) in ordered.into_iter().enumerate() {
        let row = (idx + 1) as u32;
        sheet.write_string(row, 0, &store.store)?;
        sheet.write_number_with_format(row, 1, store.items as f64, &styles.integer)?;
        sheet.write_number_with_format(row, 2, store.total_quantity as f64, &styles.integer)?;
        sheet.write_number_with_format(row, 3, store.suggested_total, &styles.money)?;
        sheet.write_number_with_format(row, 4, store.realized_total, &styles.money)?;
        sheet.write_number_with_format(row, 5, store.difference, &styles.money)?;
        write_optional(sheet, row, 6, store.difference_ratio, &styles.percent)?;
    }
    sheet.set_column_width(0, 12.0)?;
    sheet.set_column_width(1, 10.0)?;
    sheet.set_column_width(2, 12.0)?;
    for col in 3..=5 {
        sheet.set_column_width(col, 18.0)?;
    }
    sheet.set_column_width(6, 14.0)?;

    workbook.save(path)?;
    Ok(())
}

/// Writes rejected input rows with the reason each one failed.
pub fn write_rejections(path: &Path, rejected: &[RejectedRow]) -> Result<()> {
    ensure_parent(path)?;
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(ERRORS_SHEET)?;

    let mut columns: Vec<&str> = vec!["Row"];
    columns.extend(INPUT_COLUMNS.iter().map(|column| column.header()));
    columns.push("Error");

    for (row_idx, row) in rejected.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        sheet.write_number(excel_row, 0, row.row as f64)?;
        for (col_idx, cell) in row.cells.iter().enumerate() {
            sheet.write_string(excel_row, (col_idx + 1) as u16, cell)?;
        }
        sheet.write_string(excel_row, (columns.len() - 1) as u16, &row.reason)?;
    }

    let table_columns: Vec<TableColumn> = columns
        .iter()
        .map(|name| TableColumn::new().set_header(*name))
        .collect();
    let table = Table::new()
        .set_autofilter(true)
        .set_columns(&table_columns);
    let col_end = (columns.len() as u16).saturating_sub(1);
    let row_end = rejected.len().max(1) as u32;
    sheet.add_table(0, 0, row_end, col_end, &table)?;
    sheet.set_column_width(col_end, 48.0)?;

    workbook.save(path)?;
    Ok(())
}

/// Writes an empty input workbook with helper lists and instructions.
pub fn write_template(path: &Path, stores: &[String], equipment: &[&str]) -> Result<()> {
    ensure_parent(path)?;
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    let input = workbook.add_worksheet();
    input.set_name(INPUT_SHEET)?;
    let headers: Vec<&str> = INPUT_COLUMNS.iter().map(|column| column.header()).collect();
    write_headers(input, &headers, &styles)?;
    input.set_column_width(0, 12.0)?;
    input.set_column_width(1, 28.0)?;
    input.set_column_width(2, 12.0)?;
    input.set_column_width(3, 16.0)?;
    input.set_column_width(4, 16.0)?;

    let lists = workbook.add_worksheet();
    lists.set_name("Lists")?;
    lists.write_string_with_format(0, 0, "Store", &styles.header)?;
    for (idx, store) in stores.iter().enumerate() {
        lists.write_string((idx + 1) as u32, 0, store)?;
    }
    lists.write_string_with_format(0, 2, "Equipment", &styles.header)?;
    for (idx, name) in equipment.iter().enumerate() {
        lists.write_string((idx + 1) as u32, 2, *name)?;
    }

    let readme = workbook.add_worksheet();
    readme.set_name("ReadMe")?;
    let instructions = [
        "How to use this file:",
        "1) Fill the 'Equipment' sheet with one row per equipment line.",
        "2) 'Store' and 'Equipment' have helper lists in 'Lists'.",
        "3) 'Quantity' must be a whole number >= 1.",
        "4) 'Suggested price' and 'Realized price' are optional values >= 0 (R$).",
        "5) Save the filled file under input/ and run the process command.",
    ];
    for (idx, line) in instructions.iter().enumerate() {
        readme.write_string(idx as u32, 0, *line)?;
    }
    readme.set_column_width(0, 90.0)?;

    workbook.save(path)?;
    Ok(())
}

fn write_headers(sheet: &mut Worksheet, headers: &[&str], styles: &Styles) -> Result<()> {
    for (col_idx, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col_idx as u16, *header, &styles.header)?;
    }
    Ok(())
}

fn write_optional(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<f64>,
    format: &Format,
) -> Result<()> {
    if let Some(value) = value {
        sheet.write_number_with_format(row, col, value, format)?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
