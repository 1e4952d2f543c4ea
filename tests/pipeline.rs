use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{DataType, Reader, Xlsx, open_workbook};
use equipment_reports::config::{DEFAULT_BASE_DIR, ReportConfig};
use equipment_reports::history::PriceHistory;
use equipment_reports::io::excel_read::{self, NumericCell, RawRow};
use equipment_reports::model::{EquipmentRecord, HistoricalEntry};
use equipment_reports::pipeline::{self, DEFAULT_PDF_DIR, ProcessOptions, RunStatus};
use lopdf::Document;
use rust_xlsxwriter::Workbook;
use tempfile::{TempDir, tempdir};

#[derive(Clone, Copy)]
enum Cell {
    Text(&'static str),
    Number(f64),
    Blank,
}

const HEADERS: [&str; 5] = [
    "Store",
    "Equipment",
    "Quantity",
    "Suggested price",
    "Realized price",
];

fn write_sheet(path: &Path, sheet: &str, headers: &[&str], rows: &[[Cell; 5]]) {
    fs::create_dir_all(path.parent().expect("parent")).expect("input dir");
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).expect("sheet named");
    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .expect("header written");
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    worksheet
                        .write_string(excel_row, col as u16, *text)
                        .expect("text written");
                }
                Cell::Number(value) => {
                    worksheet
                        .write_number(excel_row, col as u16, *value)
                        .expect("number written");
                }
                Cell::Blank => {}
            }
        }
    }
    workbook.save(path).expect("input saved");
}

/// Creates `<tmp>/project/input/batch.xlsx` and returns the temp dir and path.
fn project_input(rows: &[[Cell; 5]]) -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("project").join("input").join("batch.xlsx");
    write_sheet(&input, "Equipment", &HEADERS, rows);
    (temp_dir, input)
}

fn cell_at(path: &Path, sheet: &str, row: u32, col: u32) -> DataType {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("report opened");
    let range = workbook
        .worksheet_range(sheet)
        .expect("sheet present")
        .expect("sheet read");
    range
        .get_value((row, col))
        .cloned()
        .unwrap_or(DataType::Empty)
}

fn seed(store: &str, equipment: &str, price: f64) -> HistoricalEntry {
    HistoricalEntry {
        store: store.into(),
        equipment: equipment.into(),
        realized_price: price,
        source: "seed".into(),
        timestamp: "2024-01-01T00:00:00.000000".into(),
    }
}

#[test]
fn base_dir_is_inferred_from_input_folder() {
    let (temp_dir, input) = project_input(&[]);

    let config = ReportConfig::infer_from_input(&input);
    let expected = temp_dir
        .path()
        .join("project")
        .canonicalize()
        .expect("canonical base");
    assert_eq!(config.base_dir(), expected.as_path());

    let elsewhere = temp_dir.path().join("batch.xlsx");
    let fallback = ReportConfig::infer_from_input(&elsewhere);
    assert_eq!(fallback.base_dir(), Path::new(DEFAULT_BASE_DIR));
}

#[test]
fn process_prices_rows_writes_reports_and_records_history() {
    let (_temp_dir, input) = project_input(&[
        [Cell::Text("3569"), Cell::Text("Notebook"), Cell::Number(2.0), Cell::Blank, Cell::Blank],
        [
            Cell::Text("3569"),
            Cell::Text("Monitor"),
            Cell::Number(1.0),
            Cell::Number(900.0),
            Cell::Number(950.0),
        ],
        [Cell::Text("6402"), Cell::Text("Notebook"), Cell::Number(1.0), Cell::Blank, Cell::Number(1000.0)],
        [Cell::Text("6402"), Cell::Text("Notebook"), Cell::Number(1.0), Cell::Blank, Cell::Number(1200.0)],
    ]);
    let config = ReportConfig::infer_from_input(&input);
    let history = PriceHistory::open(&config);
    history
        .save(vec![seed("3569", "Notebook", 3000.0), seed("3569", "Notebook", 3400.0)])
        .expect("history seeded");

    let outcome = pipeline::process(&config, &input, &ProcessOptions::default()).expect("pipeline ran");

    assert_eq!(outcome.status, RunStatus::Ok);
    assert_eq!(outcome.errors_path, None);
    assert_eq!(outcome.history_appended, 3);
    assert_eq!(
        outcome.store_reports,
        vec![
            pipeline::store_report_path(&config, "3569"),
            pipeline::store_report_path(&config, "6402"),
        ]
    );
    assert!(outcome.store_reports.iter().all(|path| path.exists()));
    assert!(outcome.pdf_reports.is_empty());

    let store_3569 = &outcome.store_reports[0];
    assert_eq!(cell_at(store_3569, "Items", 1, 0), DataType::String("Notebook".into()));
    assert_eq!(cell_at(store_3569, "Items", 1, 2), DataType::Float(3200.0));
    let store_6402 = &outcome.store_reports[1];
    assert_eq!(cell_at(store_6402, "Items", 1, 2), DataType::Float(1100.0));

    let summary = outcome.summary_path.expect("summary written");
    assert_eq!(cell_at(&summary, "Summary", 1, 0), DataType::String("3569".into()));
    assert_eq!(cell_at(&summary, "Summary", 1, 3), DataType::Float(7300.0));
    assert_eq!(cell_at(&summary, "Summary", 1, 4), DataType::Float(7350.0));

    assert_eq!(history.load().len(), 5);
}

#[test]
fn later_runs_use_prices_recorded_by_earlier_runs() {
    let (_temp_dir, input) = project_input(&[[
        Cell::Text("6402"),
        Cell::Text("Router"),
        Cell::Number(1.0),
        Cell::Blank,
        Cell::Number(150.0),
    ]]);
    let config = ReportConfig::infer_from_input(&input);
    pipeline::process(&config, &input, &ProcessOptions::default()).expect("first run");

    let second_input = config.input_dir().join("second.xlsx");
    write_sheet(
        &second_input,
        "Equipment",
        &HEADERS,
        &[
            [Cell::Text("6402"), Cell::Text("Router"), Cell::Number(3.0), Cell::Blank, Cell::Blank],
            [Cell::Text("3569"), Cell::Text("Router"), Cell::Number(1.0), Cell::Blank, Cell::Blank],
        ],
    );

    let priced = pipeline::suggest(&config, &second_input).expect("suggestions");

    assert_eq!(priced[0].calculated_price, Some(150.0));
    assert_eq!(priced[0].record.suggested_price, Some(150.0));
    assert_eq!(priced[1].calculated_price, None);
}

#[test]
fn report_commands_do_not_touch_history() {
    let (_temp_dir, input) = project_input(&[[
        Cell::Text("3569"),
        Cell::Text("Notebook"),
        Cell::Number(1.0),
        Cell::Number(3000.0),
        Cell::Number(3100.0),
    ]]);
    let config = ReportConfig::infer_from_input(&input);

    let reports = pipeline::store_reports(&config, &input).expect("reports");
    let summary = pipeline::summary(&config, &input).expect("summary");

    assert_eq!(reports.len(), 1);
    assert_eq!(summary, Some(pipeline::summary_path(&config)));
    assert!(!config.history_parquet_path().exists());
    assert!(!config.history_csv_path().exists());
}

#[test]
fn rejected_rows_are_logged_and_reported() {
    let (_temp_dir, input) = project_input(&[
        [Cell::Blank, Cell::Text("Notebook"), Cell::Number(1.0), Cell::Blank, Cell::Blank],
        [Cell::Text("3569"), Cell::Text("Monitor"), Cell::Number(0.0), Cell::Blank, Cell::Blank],
        [
            Cell::Text("3569"),
            Cell::Text("Router"),
            Cell::Number(1.5),
            Cell::Number(-10.0),
            Cell::Text("abc"),
        ],
    ]);
    let config = ReportConfig::infer_from_input(&input);

    let outcome = pipeline::process(&config, &input, &ProcessOptions::default()).expect("pipeline ran");

    assert_eq!(outcome.status, RunStatus::ValidationError);
    assert!(outcome.store_reports.is_empty());
    let errors_path = outcome.errors_path.expect("errors logged");
    assert!(errors_path.exists());
    assert_eq!(
        cell_at(&errors_path, "Errors", 3, 6),
        DataType::String(
            "Quantity invalid (1.5); Suggested price negative (-10); Realized price invalid (abc)"
                .into()
        )
    );
}

#[test]
fn empty_sheet_reports_empty_status() {
    let (_temp_dir, input) = project_input(&[]);
    let config = ReportConfig::infer_from_input(&input);

    let outcome = pipeline::process(&config, &input, &ProcessOptions::default()).expect("pipeline ran");

    assert_eq!(outcome.status, RunStatus::Empty);
    assert_eq!(outcome.errors_path, None);
    assert_eq!(outcome.summary_path, None);
}

#[test]
fn configured_store_list_rejects_unknown_stores() {
    let (_temp_dir, input) = project_input(&[
        [Cell::Text("3569"), Cell::Text("Notebook"), Cell::Number(1.0), Cell::Blank, Cell::Blank],
        [Cell::Text("9999"), Cell::Text("Notebook"), Cell::Number(1.0), Cell::Blank, Cell::Blank],
    ]);
    let config = ReportConfig::infer_from_input(&input);
    fs::create_dir_all(config.config_dir()).expect("config dir");
    fs::write(config.stores_path(), r#"{"stores": ["3569", "6402"]}"#).expect("stores written");

    let outcome = pipeline::validate(&config, &input).expect("validated");

    assert_eq!(outcome.valid_rows, 1);
    assert_eq!(outcome.rejected_rows, 1);
    assert_eq!(outcome.stores, vec!["3569".to_string()]);
    assert!(outcome.errors_path.is_some());
}

#[test]
fn legacy_sheet_and_headers_are_accepted() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("cadastro.xlsx");
    write_sheet(
        &input,
        "Cadastro",
        &["Loja", "Equipamento", "Quantidade", "Preço sugerido", "Preço real"],
        &[[
            Cell::Number(3569.0),
            Cell::Text(" Notebook "),
            Cell::Number(2.0),
            Cell::Text("3000,50"),
            Cell::Blank,
        ]],
    );

    let batch = excel_read::read_batch(&input, None).expect("read");

    assert!(batch.rejected.is_empty());
    assert_eq!(
        batch.valid,
        vec![EquipmentRecord::new("3569", "Notebook", 2).with_suggested_price(3000.5)]
    );
}

#[test]
fn validation_collects_every_failed_rule() {
    let stores: BTreeSet<String> = ["3569".to_string()].into_iter().collect();
    let rows = vec![
        RawRow {
            row: 2,
            store: "7000".into(),
            equipment: "  ".into(),
            quantity: NumericCell::Empty,
            suggested_price: NumericCell::Number(10.0),
            realized_price: NumericCell::Empty,
            cells: vec!["7000".into(), String::new(), String::new(), "10".into(), String::new()],
        },
        RawRow {
            row: 3,
            store: "3569".into(),
            equipment: "Notebook".into(),
            quantity: NumericCell::Number(4.0),
            suggested_price: NumericCell::Empty,
            realized_price: NumericCell::Number(0.0),
            cells: vec!["3569".into(), "Notebook".into(), "4".into(), String::new(), "0".into()],
        },
    ];

    let batch = excel_read::validate_rows(rows, Some(&stores));

    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].row, 2);
    assert_eq!(
        batch.rejected[0].reason,
        "Store invalid (7000); Equipment missing; Quantity missing"
    );
    assert_eq!(
        batch.valid,
        vec![EquipmentRecord::new("3569", "Notebook", 4).with_realized_price(0.0)]
    );
}

#[test]
fn template_creates_layout_and_workbook() {
    let temp_dir = tempdir().expect("temporary directory");
    let config = ReportConfig::new(temp_dir.path().join("project"));
    fs::create_dir_all(config.config_dir()).expect("config dir");
    fs::write(config.stores_path(), r#"["6402", "3569"]"#).expect("stores written");

    let path = pipeline::create_template(&config).expect("template");

    assert!(config.output_dir().is_dir());
    assert!(config.logs_dir().is_dir());
    let workbook: Xlsx<_> = open_workbook(&path).expect("template opened");
    assert_eq!(
        workbook.sheet_names().to_vec(),
        vec!["Equipment".to_string(), "Lists".to_string(), "ReadMe".to_string()]
    );
    assert_eq!(cell_at(&path, "Lists", 1, 0), DataType::String("3569".into()));
    assert_eq!(cell_at(&path, "Equipment", 0, 3), DataType::String("Suggested price".into()));
}

fn page_count(path: &Path) -> usize {
    Document::load(path).expect("pdf parsed").get_pages().len()
}

#[test]
fn process_writes_pdfs_when_asked() {
    let (_temp_dir, input) = project_input(&[
        [Cell::Text("3569"), Cell::Text("Notebook"), Cell::Number(2.0), Cell::Number(3000.0), Cell::Blank],
        [Cell::Text("6402"), Cell::Text("Impressão"), Cell::Number(1.0), Cell::Blank, Cell::Number(850.0)],
    ]);
    let config = ReportConfig::infer_from_input(&input);

    let outcome = pipeline::process(&config, &input, &ProcessOptions::with_pdf("store-pdfs"))
        .expect("pipeline ran");

    assert_eq!(
        outcome.pdf_reports,
        vec![
            pipeline::store_pdf_path(&config, "store-pdfs", "3569"),
            pipeline::store_pdf_path(&config, "store-pdfs", "6402"),
        ]
    );
    for path in &outcome.pdf_reports {
        assert!(path.starts_with(config.output_dir().join("store-pdfs")));
        let bytes = fs::read(path).expect("pdf read");
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(page_count(path), 1);
    }
}

#[test]
fn pdf_command_splits_long_stores_across_pages() {
    let rows: Vec<[Cell; 5]> = (0..65)
        .map(|_| {
            [
                Cell::Text("3569"),
                Cell::Text("Notebook"),
                Cell::Number(1.0),
                Cell::Number(3000.0),
                Cell::Number(2900.0),
            ]
        })
        .collect();
    let (_temp_dir, input) = project_input(&rows);
    let config = ReportConfig::infer_from_input(&input);

    let paths = pipeline::pdf_reports(&config, &input, DEFAULT_PDF_DIR).expect("pdfs written");

    assert_eq!(paths, vec![pipeline::store_pdf_path(&config, DEFAULT_PDF_DIR, "3569")]);
    // 30 + 30 + 5 item rows, the summary shares the last page.
    assert_eq!(page_count(&paths[0]), 3);
    assert!(!config.history_parquet_path().exists());
    assert!(!config.output_dir().join("store_summary.xlsx").exists());
}

#[test]
fn pdf_command_without_valid_rows_writes_nothing() {
    let (_temp_dir, input) = project_input(&[[
        Cell::Blank,
        Cell::Text("Notebook"),
        Cell::Number(1.0),
        Cell::Blank,
        Cell::Blank,
    ]]);
    let config = ReportConfig::infer_from_input(&input);

    let paths = pipeline::pdf_reports(&config, &input, DEFAULT_PDF_DIR).expect("command ran");

    assert!(paths.is_empty());
    assert!(!config.output_dir().join(DEFAULT_PDF_DIR).exists());
}
