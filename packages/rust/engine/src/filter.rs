//! Row filtering: which rows of a grid are eligible for an enrichment step.
//!
//! A row is eligible iff the step's target cell is empty and every
//! required source field has content. Re-running a step therefore never
//! touches rows that already have a value.

use assetpilot_shared::{AssetPilotError, Result};
use assetpilot_sheets::{ColumnMap, Row, cell, cell_is_empty, display_row_number, resolve_columns};

use crate::kinds::{
    AI_DATA_COLUMN, ASSET_COLUMN, COMPARABLE_COLUMN, Field, RAW_DATA_COLUMN, StepSpec,
};
use crate::prompt::JobFields;

/// Resolved column indices for one step run.
#[derive(Debug, Clone)]
pub struct StepColumns {
    /// Column the step writes.
    pub target: usize,
    pub asset: Option<usize>,
    pub tech: Option<usize>,
    pub ai_data: Option<usize>,
    pub comparable: Option<usize>,
}

/// Resolve the step's wanted columns against the header row.
///
/// Missing required columns abort the run with a configuration error
/// naming every absent column.
pub fn resolve_step_columns(headers: &[String], spec: &StepSpec) -> Result<StepColumns> {
    let wanted: Vec<&str> = spec
        .required_columns
        .iter()
        .chain(spec.optional_columns.iter())
        .copied()
        .collect();
    let map = resolve_columns(headers, &wanted);

    let missing = map.missing(spec.required_columns);
    if !missing.is_empty() {
        return Err(AssetPilotError::config(format!(
            "sheet is missing required columns: {}",
            missing.join(", ")
        )));
    }

    Ok(StepColumns {
        target: map
            .get(spec.target_column)
            .expect("target column is always required"),
        asset: lookup(&map, ASSET_COLUMN),
        tech: lookup(&map, RAW_DATA_COLUMN),
        ai_data: lookup(&map, AI_DATA_COLUMN),
        comparable: lookup(&map, COMPARABLE_COLUMN),
    })
}

fn lookup(map: &ColumnMap, name: &str) -> Option<usize> {
    map.get(name)
}

/// One unit of enrichment work bound to exactly one row.
#[derive(Debug, Clone)]
pub struct EnrichmentJob {
    /// Index into the data-row array.
    pub index: usize,
    /// 1-based display row number on the sheet.
    pub row_number: usize,
    /// Source fields extracted at selection time.
    pub fields: JobFields,
}

/// Rows excluded from a run, bucketed for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    /// Target cell already has a value.
    pub filled: usize,
    /// A required source field is empty.
    pub missing_data: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.filled + self.missing_data
    }
}

/// Select eligible rows into jobs.
pub fn select_jobs(
    rows: &[Row],
    cols: &StepColumns,
    spec: &StepSpec,
) -> (Vec<EnrichmentJob>, SkipCounts) {
    let mut jobs = Vec::new();
    let mut skips = SkipCounts::default();

    for (index, row) in rows.iter().enumerate() {
        if !cell_is_empty(row, cols.target) {
            skips.filled += 1;
            continue;
        }

        let fields = extract_fields(row, cols);
        let missing_required = spec.required_fields.iter().any(|field| {
            match field {
                Field::Asset => fields.asset.is_empty(),
                Field::Tech => fields.tech.is_empty(),
                Field::AiData => fields.ai_data.is_empty(),
                Field::Comparable => fields.comparable.is_empty(),
            }
        });
        if missing_required {
            skips.missing_data += 1;
            continue;
        }

        jobs.push(EnrichmentJob {
            index,
            row_number: display_row_number(index),
            fields,
        });
    }

    (jobs, skips)
}

fn extract_fields(row: &Row, cols: &StepColumns) -> JobFields {
    JobFields {
        asset: field_value(row, cols.asset),
        tech: field_value(row, cols.tech),
        ai_data: field_value(row, cols.ai_data),
        comparable: field_value(row, cols.comparable),
    }
}

fn field_value(row: &Row, idx: Option<usize>) -> String {
    idx.map(|i| cell(row, i).to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::EnrichmentKind;

    fn headers() -> Vec<String> {
        [
            "YOM > OEM > MODEL",
            "Raw Trusted Data",
            "AI Data",
            "Script Technical Description",
            "AI Comparable Price",
            "Price",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_required_column_is_a_config_error() {
        let spec = EnrichmentKind::ExtractPrice.spec();
        let headers = vec!["Price".to_string(), "Raw Trusted Data".to_string()];
        let err = resolve_step_columns(&headers, spec).expect_err("must fail");
        let msg = err.to_string();
        assert!(msg.contains("missing required columns"));
        assert!(msg.contains("AI Comparable Price"));
    }

    #[test]
    fn filled_target_rows_are_skipped() {
        let spec = EnrichmentKind::Description.spec();
        let cols = resolve_step_columns(&headers(), spec).expect("resolve");

        let rows = vec![
            row(&["cat 950m", "specs", "", "already described", "", ""]),
            row(&["cat 950m", "specs", "", "", "", ""]),
        ];
        let (jobs, skips) = select_jobs(&rows, &cols, spec);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].index, 1);
        assert_eq!(skips.filled, 1);
        assert_eq!(skips.missing_data, 0);
    }

    #[test]
    fn rows_missing_required_sources_are_skipped() {
        let spec = EnrichmentKind::Comparables.spec();
        let cols = resolve_step_columns(&headers(), spec).expect("resolve");

        let rows = vec![
            row(&["cat 950m", "", "", "", "", ""]),   // no tech
            row(&["", "specs", "", "", "", ""]),      // no asset
            row(&["cat 950m", "specs", "", "", "", ""]),
        ];
        let (jobs, skips) = select_jobs(&rows, &cols, spec);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].index, 2);
        assert_eq!(skips.missing_data, 2);
    }

    #[test]
    fn description_tolerates_empty_ai_data_cell() {
        let spec = EnrichmentKind::Description.spec();
        let cols = resolve_step_columns(&headers(), spec).expect("resolve");

        let rows = vec![row(&["cat 950m", "specs", "", "", "", ""])];
        let (jobs, _) = select_jobs(&rows, &cols, spec);
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].fields.ai_data.is_empty());
    }

    #[test]
    fn job_row_numbers_use_the_sheet_offset() {
        let spec = EnrichmentKind::Description.spec();
        let cols = resolve_step_columns(&headers(), spec).expect("resolve");

        let rows = vec![
            row(&["a", "specs", "", "", "", ""]),
            row(&["b", "specs", "", "", "", ""]),
        ];
        let (jobs, _) = select_jobs(&rows, &cols, spec);
        assert_eq!(jobs[0].row_number, 3);
        assert_eq!(jobs[1].row_number, 4);
    }

    #[test]
    fn short_rows_are_handled() {
        let spec = EnrichmentKind::Description.spec();
        let cols = resolve_step_columns(&headers(), spec).expect("resolve");

        // Row shorter than the target column index: target counts as empty.
        let rows = vec![row(&["a", "specs"])];
        let (jobs, skips) = select_jobs(&rows, &cols, spec);
        assert_eq!(jobs.len(), 1);
        assert_eq!(skips.total(), 0);
    }

    #[test]
    fn extract_price_requires_comparable_content() {
        let spec = EnrichmentKind::ExtractPrice.spec();
        let cols = resolve_step_columns(&headers(), spec).expect("resolve");

        let rows = vec![
            row(&["a", "specs", "", "", "", ""]),
            row(&["a", "specs", "", "", "Condition: Used, Price: $1, URL: u", ""]),
        ];
        let (jobs, skips) = select_jobs(&rows, &cols, spec);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].index, 1);
        assert_eq!(skips.missing_data, 1);
    }
}
