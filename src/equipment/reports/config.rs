use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::equipment::reports::error::{ReportError, Result};

/// Folder used when the base directory cannot be inferred from the input.
pub const DEFAULT_BASE_DIR: &str = "equipment_reports";
/// Maximum number of entries kept in the price history.
pub const HISTORY_CAPACITY: usize = 200_000;

const INPUT_DIR: &str = "input";
const OUTPUT_DIR: &str = "output";
const LOGS_DIR: &str = "logs";
const CONFIG_DIR: &str = "config";
const STORES_FILE: &str = "stores.json";
const HISTORY_PARQUET: &str = "price_history.parquet";
const HISTORY_CSV: &str = "price_history.csv";
const LEGACY_HISTORY_PARQUET: &str = "precos_historico.parquet";
const LEGACY_HISTORY_CSV: &str = "precos_historico.csv";

/// Paths and limits shared by every command. Everything hangs off a single
/// base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    base_dir: PathBuf,
    history_capacity: usize,
}

impl ReportConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            history_capacity: HISTORY_CAPACITY,
        }
    }

    /// Derives the base directory from the input workbook location.
    ///
    /// `.../<base>/input/sheet.xlsx` yields `<base>`; anything else falls back
    /// to [`DEFAULT_BASE_DIR`] under the current directory.
    pub fn infer_from_input(input: &Path) -> Self {
        let resolved = input
            .canonicalize()
            .unwrap_or_else(|_| input.to_path_buf());
        let from_input = resolved.parent().and_then(|parent| {
            let is_input_dir = parent
                .file_name()
                .map(|name| name.to_string_lossy().eq_ignore_ascii_case(INPUT_DIR))
                .unwrap_or(false);
            if is_input_dir {
                parent.parent().map(Path::to_path_buf)
            } else {
                None
            }
        });
        let base = from_input.unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));
        debug!(base = %base.display(), "resolved base directory");
        Self::new(base)
    }

    /// Overrides the history retention cap.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn input_dir(&self) -> PathBuf {
        self.base_dir.join(INPUT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.base_dir.join(OUTPUT_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join(LOGS_DIR)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join(CONFIG_DIR)
    }

    pub fn history_parquet_path(&self) -> PathBuf {
        self.config_dir().join(HISTORY_PARQUET)
    }

    pub fn history_csv_path(&self) -> PathBuf {
        self.config_dir().join(HISTORY_CSV)
    }

    /// Parquet file written by older releases; only ever read.
    pub fn legacy_history_parquet_path(&self) -> PathBuf {
        self.config_dir().join(LEGACY_HISTORY_PARQUET)
    }

    /// CSV file written by older releases; only ever read.
    pub fn legacy_history_csv_path(&self) -> PathBuf {
        self.config_dir().join(LEGACY_HISTORY_CSV)
    }

    pub fn stores_path(&self) -> PathBuf {
        self.config_dir().join(STORES_FILE)
    }

    /// Loads the list of accepted store identifiers.
    ///
    /// Returns `None` when no list is configured, meaning any non-empty store
    /// is accepted.
    pub fn load_valid_stores(&self) -> Result<Option<BTreeSet<String>>> {
        let path = self.stores_path();
        if !path.exists() {
            debug!(path = %path.display(), "no store list configured");
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let parsed: StoreList =
            serde_json::from_str(&data).map_err(|error| ReportError::InvalidConfig {
                path: path.clone(),
                reason: error.to_string(),
            })?;
        let stores: BTreeSet<String> = parsed
            .into_stores()
            .into_iter()
            .map(|store| store.trim().to_string())
            .filter(|store| !store.is_empty())
            .collect();
        debug!(count = stores.len(), "loaded store list");
        Ok(Some(stores))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoreList {
    Plain(Vec<String>),
    Wrapped { stores: Vec<String> },
}

impl StoreList {
    fn into_stores(self) -> Vec<String> {
        match self {
            StoreList::Plain(stores) | StoreList::Wrapped { stores } => stores,
        }
    }
}
