//! Suggested price estimation.
//!
//! Every row gets the first usable (present and positive) value from this
//! cascade:
//!
//! 1. the suggested price declared on the row;
//! 2. the median realized price in the history for the same store and equipment;
//! 3. the median realized price of the same equipment in the current batch;
//! 4. the median declared suggested price of the same equipment in the batch.
//!
//! When none applies the row has no suggestion. Store and equipment names are
//! compared after trimming, case-sensitively.

pub mod stats;

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::equipment::reports::model::{
    EquipmentRecord, HistoricalEntry, PriceField, PricedRecord,
};
use stats::{median, usable};

/// Tier of the cascade that produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Declared,
    History,
    BatchRealized,
    BatchSuggested,
}

/// A usable suggested price and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Suggestion {
    pub price: f64,
    pub source: PriceSource,
}

/// Medians precomputed once per batch so each row is priced with map lookups.
#[derive(Debug, Clone, Default)]
pub struct PriceLookup {
    history: HashMap<(String, String), f64>,
    batch_realized: HashMap<String, f64>,
    batch_suggested: HashMap<String, f64>,
}

impl PriceLookup {
    pub fn build(records: &[EquipmentRecord], history: &[HistoricalEntry]) -> Self {
        let mut history_prices: HashMap<(String, String), Vec<f64>> = HashMap::new();
        for entry in history {
            history_prices
                .entry(pair_key(&entry.store, &entry.equipment))
                .or_default()
                .push(entry.realized_price);
        }

        let mut realized: HashMap<String, Vec<f64>> = HashMap::new();
        let mut suggested: HashMap<String, Vec<f64>> = HashMap::new();
        for record in records {
            let key = record.equipment.trim();
            if let Some(price) = record.realized_price {
                realized.entry(key.to_string()).or_default().push(price);
            }
            if let Some(price) = record.suggested_price {
                suggested.entry(key.to_string()).or_default().push(price);
            }
        }

        Self {
            history: medians(history_prices),
            batch_realized: medians(realized),
            batch_suggested: medians(suggested),
        }
    }

    /// Walks the cascade for one row.
    pub fn suggest(&self, record: &EquipmentRecord) -> Option<Suggestion> {
        let equipment = record.equipment.trim();
        let candidates = [
            (PriceSource::Declared, record.suggested_price),
            (
                PriceSource::History,
                self.history
                    .get(&pair_key(&record.store, &record.equipment))
                    .copied(),
            ),
            (
                PriceSource::BatchRealized,
                self.batch_realized.get(equipment).copied(),
            ),
            (
                PriceSource::BatchSuggested,
                self.batch_suggested.get(equipment).copied(),
            ),
        ];

        candidates
            .into_iter()
            .find_map(|(source, value)| usable(value).map(|price| Suggestion { price, source }))
    }
}

/// Suggests a price for every row, aligned with `records`.
pub fn suggest_prices(records: &[EquipmentRecord], history: &[HistoricalEntry]) -> Vec<Option<f64>> {
    explain_prices(records, history)
        .into_iter()
        .map(|suggestion| suggestion.map(|s| s.price))
        .collect()
}

/// Like [`suggest_prices`] but keeps the tier each value came from.
pub fn explain_prices(
    records: &[EquipmentRecord],
    history: &[HistoricalEntry],
) -> Vec<Option<Suggestion>> {
    let lookup = PriceLookup::build(records, history);
    let suggestions: Vec<Option<Suggestion>> =
        records.iter().map(|record| lookup.suggest(record)).collect();

    let mut by_source: HashMap<PriceSource, usize> = HashMap::new();
    for suggestion in suggestions.iter().flatten() {
        *by_source.entry(suggestion.source).or_default() += 1;
    }
    debug!(
        rows = records.len(),
        declared = by_source.get(&PriceSource::Declared).copied().unwrap_or(0),
        history = by_source.get(&PriceSource::History).copied().unwrap_or(0),
        batch_realized = by_source.get(&PriceSource::BatchRealized).copied().unwrap_or(0),
        batch_suggested = by_source.get(&PriceSource::BatchSuggested).copied().unwrap_or(0),
        "estimated suggested prices"
    );
    suggestions
}

/// Fills `target` with the estimated price wherever it is unset or not
/// positive. Rows that already hold a positive value keep it.
///
/// The input is left untouched; every returned row also carries the raw
/// estimate in [`PricedRecord::calculated_price`].
pub fn apply_suggested_prices(
    records: &[EquipmentRecord],
    history: &[HistoricalEntry],
    target: PriceField,
) -> Vec<PricedRecord> {
    let suggestions = suggest_prices(records, history);
    let mut filled = 0usize;

    let priced: Vec<PricedRecord> = records
        .iter()
        .zip(suggestions)
        .map(|(record, calculated)| {
            let mut record = record.clone();
            if usable(record.price(target)).is_none() {
                *record.price_mut(target) = calculated;
                if calculated.is_some() {
                    filled += 1;
                }
            }
            PricedRecord {
                record,
                calculated_price: calculated,
            }
        })
        .collect();

    debug!(rows = priced.len(), filled, ?target, "applied suggested prices");
    priced
}

fn pair_key(store: &str, equipment: &str) -> (String, String) {
    (store.trim().to_string(), equipment.trim().to_string())
}

fn medians<K: std::hash::Hash + Eq>(groups: HashMap<K, Vec<f64>>) -> HashMap<K, f64> {
    groups
        .into_iter()
        .filter_map(|(key, values)| median(&values).map(|value| (key, value)))
        .collect()
}
