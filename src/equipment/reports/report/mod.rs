//! Totals shown in the store workbooks and the consolidated summary.
//!
//! A missing realized price falls back to the suggested price, and a missing
//! suggested price counts as zero.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::equipment::reports::model::{EquipmentRecord, StoreId};

/// Computed values for one equipment line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemLine {
    pub equipment: String,
    pub quantity: u32,
    pub suggested_price: Option<f64>,
    pub realized_price: Option<f64>,
    pub suggested_total: f64,
    pub realized_total: f64,
    pub difference: f64,
    /// `None` when the suggested total is zero.
    pub difference_ratio: Option<f64>,
}

impl ItemLine {
    pub fn from_record(record: &EquipmentRecord) -> Self {
        let quantity = f64::from(record.quantity);
        let suggested = record.suggested_price.unwrap_or(0.0);
        let realized = record.realized_price.unwrap_or(suggested);
        let suggested_total = quantity * suggested;
        let realized_total = quantity * realized;

        Self {
            equipment: record.equipment.clone(),
            quantity: record.quantity,
            suggested_price: record.suggested_price,
            realized_price: record.realized_price,
            suggested_total,
            realized_total,
            difference: realized_total - suggested_total,
            difference_ratio: ratio(realized_total, suggested_total),
        }
    }
}

/// Aggregates for one store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreTotals {
    pub store: StoreId,
    pub items: usize,
    pub total_quantity: u64,
    pub suggested_total: f64,
    pub realized_total: f64,
    pub difference: f64,
    pub difference_ratio: Option<f64>,
}

impl StoreTotals {
    pub fn from_lines(store: impl Into<StoreId>, lines: &[ItemLine]) -> Self {
        let suggested_total: f64 = lines.iter().map(|line| line.suggested_total).sum();
        let realized_total: f64 = lines.iter().map(|line| line.realized_total).sum();

        Self {
            store: store.into(),
            items: lines.len(),
            total_quantity: lines.iter().map(|line| u64::from(line.quantity)).sum(),
            suggested_total,
            realized_total,
            difference: realized_total - suggested_total,
            difference_ratio: ratio(realized_total, suggested_total),
        }
    }
}

/// Everything needed to render one store workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreReport {
    pub totals: StoreTotals,
    pub lines: Vec<ItemLine>,
}

impl StoreReport {
    pub fn build(store: impl Into<StoreId>, records: &[EquipmentRecord]) -> Self {
        let lines: Vec<ItemLine> = records.iter().map(ItemLine::from_record).collect();
        let totals = StoreTotals::from_lines(store, &lines);
        Self { totals, lines }
    }
}

/// Builds one report per non-empty store, ordered by store id.
pub fn build_store_reports(groups: &BTreeMap<StoreId, Vec<EquipmentRecord>>) -> Vec<StoreReport> {
    groups
        .iter()
        .filter(|(_, records)| !records.is_empty())
        .map(|(store, records)| StoreReport::build(store.clone(), records))
        .collect()
}

/// Reduces a file name component to word characters and hyphens.
pub fn safe_file_stem(name: &str) -> String {
    let mut stem = String::new();
    let mut in_run = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == '-' {
            stem.push(ch);
            in_run = false;
        } else if !in_run {
            stem.push('_');
            in_run = true;
        }
    }
    let stem: String = stem.chars().take(120).collect();
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem
    }
}

fn ratio(realized_total: f64, suggested_total: f64) -> Option<f64> {
    if suggested_total > 0.0 {
        Some(realized_total / suggested_total - 1.0)
    } else {
        None
    }
}
