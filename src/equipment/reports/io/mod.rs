pub mod excel_read;
pub mod excel_write;
pub mod pdf_write;

/// Preferred name of the sheet holding equipment rows.
pub const INPUT_SHEET: &str = "Equipment";
/// Sheet name used by older input files.
pub const LEGACY_INPUT_SHEET: &str = "Cadastro";

/// Columns of the input sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputColumn {
    Store,
    Equipment,
    Quantity,
    SuggestedPrice,
    RealizedPrice,
}

/// Input columns in sheet order.
pub const INPUT_COLUMNS: [InputColumn; 5] = [
    InputColumn::Store,
    InputColumn::Equipment,
    InputColumn::Quantity,
    InputColumn::SuggestedPrice,
    InputColumn::RealizedPrice,
];

impl InputColumn {
    pub fn header(self) -> &'static str {
        match self {
            InputColumn::Store => "Store",
            InputColumn::Equipment => "Equipment",
            InputColumn::Quantity => "Quantity",
            InputColumn::SuggestedPrice => "Suggested price",
            InputColumn::RealizedPrice => "Realized price",
        }
    }

    fn legacy_header(self) -> &'static str {
        match self {
            InputColumn::Store => "Loja",
            InputColumn::Equipment => "Equipamento",
            InputColumn::Quantity => "Quantidade",
            InputColumn::SuggestedPrice => "Preço sugerido",
            InputColumn::RealizedPrice => "Preço real",
        }
    }

    /// Whether a (trimmed) header cell names this column.
    pub fn matches(self, header: &str) -> bool {
        header.eq_ignore_ascii_case(self.header()) || header == self.legacy_header()
    }
}
