use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of a retail store. Kept as text so leading zeros and mixed
/// codes survive the round trip through spreadsheets.
pub type StoreId = String;

/// One validated equipment line from the input sheet.
///
/// Prices are `None` when the cell was left empty, which is distinct from an
/// explicit zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    /// Store the equipment belongs to.
    pub store: StoreId,
    /// Equipment name as typed in the sheet (trimmed).
    pub equipment: String,
    /// Number of units, never negative.
    pub quantity: u32,
    /// Price the report should display when nothing better is known.
    pub suggested_price: Option<f64>,
    /// Price actually paid, when recorded.
    pub realized_price: Option<f64>,
}

impl EquipmentRecord {
    /// Creates a record without prices.
    pub fn new(store: impl Into<StoreId>, equipment: impl Into<String>, quantity: u32) -> Self {
        Self {
            store: store.into(),
            equipment: equipment.into(),
            quantity,
            suggested_price: None,
            realized_price: None,
        }
    }

    /// Sets the declared suggested price.
    pub fn with_suggested_price(mut self, price: f64) -> Self {
        self.suggested_price = Some(price);
        self
    }

    /// Sets the realized price.
    pub fn with_realized_price(mut self, price: f64) -> Self {
        self.realized_price = Some(price);
        self
    }

    /// Returns the value stored in the given price field.
    pub fn price(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Suggested => self.suggested_price,
            PriceField::Realized => self.realized_price,
        }
    }

    /// Mutable access to the given price field.
    pub fn price_mut(&mut self, field: PriceField) -> &mut Option<f64> {
        match field {
            PriceField::Suggested => &mut self.suggested_price,
            PriceField::Realized => &mut self.realized_price,
        }
    }
}

/// Selects one of the two price columns of an [`EquipmentRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceField {
    Suggested,
    Realized,
}

/// A record after the price applier ran, carrying the raw estimator output
/// next to the (possibly backfilled) record for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedRecord {
    #[serde(flatten)]
    pub record: EquipmentRecord,
    /// Estimator output for this row, whether or not it was applied.
    pub calculated_price: Option<f64>,
}

/// A persisted realized price for one (store, equipment) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEntry {
    #[serde(rename = "Store")]
    pub store: StoreId,
    #[serde(rename = "Equipment")]
    pub equipment: String,
    #[serde(rename = "RealizedPrice")]
    pub realized_price: f64,
    #[serde(rename = "SourceTag")]
    pub source: String,
    /// ISO-8601 timestamp, kept verbatim so files round-trip exactly.
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// A sheet row that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based row number in the source sheet.
    pub row: usize,
    /// Cell text as read, in canonical column order.
    pub cells: Vec<String>,
    /// Every failed rule, joined with `"; "`.
    pub reason: String,
}

/// Output of the validation stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedBatch {
    pub valid: Vec<EquipmentRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl ValidatedBatch {
    /// Groups the valid records by store. Stores come out sorted; rows keep
    /// their input order within a store.
    pub fn by_store(&self) -> BTreeMap<StoreId, Vec<EquipmentRecord>> {
        group_by_store(self.valid.iter().cloned(), |record| record.store.clone())
    }
}

/// Groups any sequence of items by store, preserving input order per store.
pub fn group_by_store<T>(
    items: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> StoreId,
) -> BTreeMap<StoreId, Vec<T>> {
    let mut groups: BTreeMap<StoreId, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}
