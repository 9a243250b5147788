//! Grid model, column resolution, and spreadsheet adapters for AssetPilot.
//!
//! This crate provides:
//! - The positional grid model ([`Grid`], [`Row`], cell helpers) with the
//!   display-row-3 data offset
//! - The fuzzy [`resolve_columns`] header resolver
//! - The [`SheetStore`] collaborator trait and the [`LocalSheet`] JSON
//!   implementation

pub mod columns;
pub mod grid;
pub mod store;

pub use columns::{ColumnMap, resolve_columns};
pub use grid::{
    DATA_START_ROW, Grid, Row, array_index, cell, cell_is_empty, column_letter,
    display_row_number, set_cell,
};
pub use store::{LocalSheet, SheetStore};
