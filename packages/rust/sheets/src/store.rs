//! Spreadsheet adapter interface and the local JSON-grid implementation.
//!
//! The engine only ever talks to [`SheetStore`]; a store instance is bound
//! to one spreadsheet tab at construction time. [`LocalSheet`] persists a
//! grid (plus cell tints) as a JSON file and backs the CLI and the
//! integration tests. A hosted-spreadsheet adapter implements the same
//! trait out of tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use assetpilot_shared::{AssetPilotError, Result};

use crate::grid::{DATA_START_ROW, Grid, Row, column_letter, set_cell};

/// Write access to one spreadsheet tab.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Read the full grid: header row plus the data rows below it.
    async fn read_grid(&self) -> Result<Grid>;

    /// Overwrite one column for the whole data range, starting at
    /// [`DATA_START_ROW`]. `values[i]` lands on data row `i`.
    async fn write_column(&self, column: usize, values: &[String]) -> Result<()>;

    /// Write a single cell addressed by column index and display row number.
    async fn write_cell(&self, column: usize, row_number: usize, value: &str) -> Result<()>;

    /// Set the background color of a single cell (`#rrggbb`).
    async fn set_cell_background(
        &self,
        column: usize,
        row_number: usize,
        color: &str,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// LocalSheet
// ---------------------------------------------------------------------------

/// On-disk JSON representation of a local sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SheetFile {
    headers: Vec<String>,
    rows: Vec<Row>,
    /// Cell background tints keyed by A1 address (e.g. `"F12"`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tints: BTreeMap<String, String>,
}

/// A [`SheetStore`] backed by a JSON file on the local filesystem.
pub struct LocalSheet {
    path: PathBuf,
    state: Mutex<SheetFile>,
}

impl LocalSheet {
    /// Open an existing sheet file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content =
            std::fs::read_to_string(&path).map_err(|e| AssetPilotError::io(&path, e))?;
        let file: SheetFile = serde_json::from_str(&content).map_err(|e| {
            AssetPilotError::Sheet(format!("invalid sheet file {}: {e}", path.display()))
        })?;
        tracing::debug!(?path, rows = file.rows.len(), "opened local sheet");
        Ok(Self {
            path,
            state: Mutex::new(file),
        })
    }

    /// Create a new sheet file with the given headers and data rows.
    pub fn create(path: impl Into<PathBuf>, headers: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let path = path.into();
        let sheet = Self {
            path,
            state: Mutex::new(SheetFile {
                headers,
                rows,
                tints: BTreeMap::new(),
            }),
        };
        sheet.persist_blocking()?;
        Ok(sheet)
    }

    /// Background tint of a cell, if one was applied.
    pub async fn tint(&self, column: usize, row_number: usize) -> Option<String> {
        let state = self.state.lock().await;
        state.tints.get(&cell_address(column, row_number)).cloned()
    }

    fn persist_blocking(&self) -> Result<()> {
        let state = self
            .state
            .try_lock()
            .map_err(|_| AssetPilotError::Sheet("sheet state lock contended".into()))?;
        write_file(&self.path, &state)
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.lock().await;
        write_file(&self.path, &state)
    }
}

fn write_file(path: &Path, state: &SheetFile) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| AssetPilotError::Sheet(format!("serialize sheet: {e}")))?;
    std::fs::write(path, json).map_err(|e| AssetPilotError::io(path, e))
}

/// A1-style address for a (column index, display row number) pair.
fn cell_address(column: usize, row_number: usize) -> String {
    format!("{}{row_number}", column_letter(column))
}

#[async_trait]
impl SheetStore for LocalSheet {
    async fn read_grid(&self) -> Result<Grid> {
        let state = self.state.lock().await;
        Ok(Grid::new(state.headers.clone(), state.rows.clone()))
    }

    async fn write_column(&self, column: usize, values: &[String]) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            for (i, value) in values.iter().enumerate() {
                while state.rows.len() <= i {
                    state.rows.push(Row::new());
                }
                set_cell(&mut state.rows[i], column, value.clone());
            }
        }
        self.persist().await
    }

    async fn write_cell(&self, column: usize, row_number: usize, value: &str) -> Result<()> {
        let index = row_number.checked_sub(DATA_START_ROW).ok_or_else(|| {
            AssetPilotError::Sheet(format!("row {row_number} is above the data range"))
        })?;
        {
            let mut state = self.state.lock().await;
            while state.rows.len() <= index {
                state.rows.push(Row::new());
            }
            set_cell(&mut state.rows[index], column, value.to_string());
        }
        self.persist().await
    }

    async fn set_cell_background(
        &self,
        column: usize,
        row_number: usize,
        color: &str,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state
                .tints
                .insert(cell_address(column, row_number), color.to_string());
        }
        self.persist().await
    }
}
