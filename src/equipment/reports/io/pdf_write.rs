//! A4 PDF rendering of a [`StoreReport`].
//!
//! Pages are drawn with the standard Helvetica fonts, so no font files are
//! embedded. Item rows are split into tables of [`ROWS_PER_TABLE`] rows, one
//! table per page, followed by the summary table. Every page carries a page
//! number in its footer.

use std::fs;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::equipment::reports::error::Result;
use crate::equipment::reports::report::{ItemLine, StoreReport};

/// Item rows drawn per table before starting a new page.
pub const ROWS_PER_TABLE: usize = 30;

const TITLE: &str = "Equipment report by store";

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const SIDE_MARGIN: f32 = 42.5;
const TOP_MARGIN: f32 = 39.7;
const BOTTOM_MARGIN: f32 = 39.7;
const FOOTER_BASELINE: f32 = 28.3;

const ITEMS_WIDTH: f32 = 510.0;
const SUMMARY_WIDTH: f32 = 340.0;
const ROW_HEIGHT: f32 = 14.0;
const CELL_PADDING: f32 = 3.0;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

const ITEM_HEADERS: [&str; 8] = [
    "Equipment",
    "Qty",
    "Suggested",
    "Realized",
    "Sugg. total",
    "Real. total",
    "Difference",
    "Diff. %",
];
const ITEM_WEIGHTS: [f32; 8] = [0.26, 0.06, 0.12, 0.12, 0.13, 0.13, 0.11, 0.07];

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Cell {
    text: String,
    align: Align,
}

impl Cell {
    fn left(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            align: Align::Left,
        }
    }

    fn right(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            align: Align::Right,
        }
    }
}

/// Drawing operations for one page.
#[derive(Default)]
struct Page {
    operations: Vec<Operation>,
}

impl Page {
    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), Object::Real(size)]),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn gray_text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new("g", vec![Object::Real(0.33)]));
        self.text(font, size, x, y, text);
        self.operations.push(Operation::new("Q", vec![]));
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, gray: f32) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("g", vec![Object::Real(gray)]),
            rect(x, y, width, height),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("G", vec![Object::Real(0.8)]),
            Operation::new("w", vec![Object::Real(0.25)]),
            rect(x, y, width, height),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }
}

/// Pages plus the vertical position of the next element on the last one.
struct Layout {
    pages: Vec<Page>,
    cursor: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            cursor: PAGE_HEIGHT - TOP_MARGIN,
        }
    }

    fn page(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = PAGE_HEIGHT - TOP_MARGIN;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height < BOTTOM_MARGIN {
            self.new_page();
        }
    }

    fn line(&mut self, font: &str, size: f32, text: &str, advance: f32) {
        self.cursor -= size;
        let y = self.cursor;
        self.page().text(font, size, SIDE_MARGIN, y, text);
        self.cursor -= advance;
    }

    fn gray_line(&mut self, size: f32, text: &str, advance: f32) {
        self.cursor -= size;
        let y = self.cursor;
        self.page().gray_text(REGULAR, size, SIDE_MARGIN, y, text);
        self.cursor -= advance;
    }

    fn table(&mut self, widths: &[f32], headers: &[&str], rows: &[Vec<Cell>], body_size: f32) {
        let header: Vec<Cell> = headers.iter().map(|text| Cell::left(*text)).collect();
        self.table_row(widths, &header, BOLD, 9.0, Some(0.95));
        for (index, row) in rows.iter().enumerate() {
            let shade = (index % 2 == 1).then_some(0.98);
            self.table_row(widths, row, REGULAR, body_size, shade);
        }
    }

    fn table_row(
        &mut self,
        widths: &[f32],
        cells: &[Cell],
        font: &str,
        size: f32,
        shade: Option<f32>,
    ) {
        let bottom = self.cursor - ROW_HEIGHT;
        let baseline = bottom + (ROW_HEIGHT - size) / 2.0 + 1.0;
        let page = self.page();
        let mut x = SIDE_MARGIN;
        for (cell, width) in cells.iter().zip(widths) {
            if let Some(gray) = shade {
                page.fill_rect(x, bottom, *width, ROW_HEIGHT, gray);
            }
            page.stroke_rect(x, bottom, *width, ROW_HEIGHT);
            let text = fit(&cell.text, *width - 2.0 * CELL_PADDING, size);
            let text_x = match cell.align {
                Align::Left => x + CELL_PADDING,
                Align::Right => x + width - CELL_PADDING - text_width(&text, size),
            };
            page.text(font, size, text_x, baseline, &text);
            x += width;
        }
        self.cursor = bottom;
    }
}

/// Writes one store report as a PDF at `path`.
pub fn write_store_pdf(path: &Path, report: &StoreReport, generated_at: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut layout = Layout::new();
    layout.line(BOLD, 14.0, TITLE, 8.0);
    layout.gray_line(9.0, &format!("Store: {}", report.totals.store), 4.0);
    layout.gray_line(9.0, &format!("Generated at: {generated_at}"), 12.0);

    let widths: Vec<f32> = ITEM_WEIGHTS.iter().map(|weight| weight * ITEMS_WIDTH).collect();
    let rows: Vec<Vec<Cell>> = report.lines.iter().map(item_cells).collect();
    if rows.is_empty() {
        layout.table(&widths, &ITEM_HEADERS, &[], 8.0);
    }
    let chunk_count = rows.chunks(ROWS_PER_TABLE).count();
    for (index, chunk) in rows.chunks(ROWS_PER_TABLE).enumerate() {
        layout.ensure_space(ROW_HEIGHT * (chunk.len() + 1) as f32);
        layout.table(&widths, &ITEM_HEADERS, chunk, 8.0);
        if index + 1 < chunk_count {
            layout.new_page();
        }
    }

    layout.cursor -= 17.0;
    layout.ensure_space(11.0 + 6.0 + ROW_HEIGHT * 7.0);
    layout.line(BOLD, 11.0, "Summary", 6.0);
    let totals = &report.totals;
    let summary_rows = vec![
        vec![Cell::left("Items"), Cell::left(totals.items.to_string())],
        vec![
            Cell::left("Total quantity"),
            Cell::left(totals.total_quantity.to_string()),
        ],
        vec![Cell::left("Suggested total"), Cell::left(money(Some(totals.suggested_total)))],
        vec![Cell::left("Realized total"), Cell::left(money(Some(totals.realized_total)))],
        vec![Cell::left("Difference"), Cell::left(money(Some(totals.difference)))],
        vec![Cell::left("Difference (%)"), Cell::left(percent(totals.difference_ratio))],
    ];
    let half = SUMMARY_WIDTH / 2.0;
    layout.table(&[half, half], &["Metric", "Value"], &summary_rows, 9.0);

    save(layout.pages, path)
}

fn item_cells(line: &ItemLine) -> Vec<Cell> {
    vec![
        Cell::left(line.equipment.clone()),
        Cell::right(line.quantity.to_string()),
        Cell::right(money(line.suggested_price)),
        Cell::right(money(line.realized_price)),
        Cell::right(money(Some(line.suggested_total))),
        Cell::right(money(Some(line.realized_total))),
        Cell::right(money(Some(line.difference))),
        Cell::right(percent(line.difference_ratio)),
    ]
}

fn save(pages: Vec<Page>, path: &Path) -> Result<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for (index, mut page) in pages.into_iter().enumerate() {
        let label = format!("Page {}", index + 1);
        let x = PAGE_WIDTH - SIDE_MARGIN - text_width(&label, 8.0);
        page.gray_text(REGULAR, 8.0, x, FOOTER_BASELINE, &label);

        let content = Content {
            operations: page.operations,
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH as i64),
                Object::Integer(PAGE_HEIGHT as i64),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    doc.save(path)?;
    Ok(())
}

fn rect(x: f32, y: f32, width: f32, height: f32) -> Operation {
    Operation::new(
        "re",
        vec![
            Object::Real(x),
            Object::Real(y),
            Object::Real(width),
            Object::Real(height),
        ],
    )
}

/// Rough Helvetica advance width; digits are 0.556 em.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.556
}

/// Cuts `text` so it fits `width`, marking the cut with "..".
fn fit(text: &str, width: f32, size: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let max_chars = (width / (size * 0.556)).floor() as usize;
    let kept: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    format!("{kept}..")
}

/// Encodes text for the standard fonts. Characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match u32::from(ch) {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Brazilian currency, e.g. `R$ 1.234,56`.
fn money(value: Option<f64>) -> String {
    let Some(value) = value.filter(|value| value.is_finite()) else {
        return "-".to_string();
    };
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}R$ {grouped},{cents}")
}

fn percent(ratio: Option<f64>) -> String {
    match ratio.filter(|ratio| ratio.is_finite()) {
        Some(ratio) => format!("{:.2}%", ratio * 100.0),
        None => "-".to_string(),
    }
}

