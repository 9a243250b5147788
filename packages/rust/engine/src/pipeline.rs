//! End-to-end step execution: read grid → resolve columns → filter →
//! schedule waves → apply deltas → record history → report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, instrument, warn};

use assetpilot_llm::{ChatCompleter, ProviderAuth, select_provider};
use assetpilot_shared::{
    ApiKeys, AssetPilotError, ProcessId, ProcessRequest, ProcessResponse, ProgressEvent, Result,
    RunStats, RunStatus,
};
use assetpilot_sheets::{SheetStore, cell};
use assetpilot_storage::{ProcessRecord, Storage};

use crate::filter::{resolve_step_columns, select_jobs};
use crate::kinds::EnrichmentKind;
use crate::scheduler::{RunOutcome, WAVE_SIZE, run_waves};
use crate::session::SessionContext;

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Jobs dispatched concurrently per wave.
    pub wave_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wave_size: WAVE_SIZE,
        }
    }
}

/// Select the provider for a step before any work starts.
///
/// Steps that depend on live web search hard-fail here when the search key
/// is absent; the rest fall back to the general-purpose provider.
pub fn preflight(kind: EnrichmentKind, keys: &ApiKeys) -> Result<ProviderAuth> {
    select_provider(keys, kind.spec().policy)
}

/// Run one enrichment step against a sheet.
///
/// Configuration problems (unknown step, missing columns) surface as `Err`;
/// runs that start always return a structured response, including partial
/// counters after a critical failure or cancellation.
#[instrument(skip_all, fields(step = %request.step, sheet = %request.sheet_id))]
pub async fn run_step(
    store: &dyn SheetStore,
    completer: Arc<dyn ChatCompleter>,
    ctx: &SessionContext,
    storage: Option<&Storage>,
    request: &ProcessRequest,
    options: &RunOptions,
) -> Result<ProcessResponse> {
    let start = Instant::now();
    let kind = EnrichmentKind::from_name(&request.step).ok_or_else(|| {
        AssetPilotError::config(format!("unknown enrichment step: '{}'", request.step))
    })?;
    let spec = kind.spec();
    let process_id = ProcessId::new();
    let sheet_label = request
        .sheet_name
        .clone()
        .unwrap_or_else(|| request.sheet_id.clone());

    let grid = store.read_grid().await?;
    let cols = resolve_step_columns(&grid.headers, spec)?;
    let (jobs, skips) = select_jobs(&grid.rows, &cols, spec);
    let base = RunStats {
        total: grid.rows.len(),
        skipped: skips.total(),
        ..Default::default()
    };

    info!(
        rows = grid.rows.len(),
        eligible = jobs.len(),
        skipped_filled = skips.filled,
        skipped_missing_data = skips.missing_data,
        "rows filtered"
    );

    ctx.emit(&ProgressEvent::Progress {
        step: spec.name.to_string(),
        stats: base,
    });

    let start_ms = Utc::now().timestamp_millis();
    if let Some(db) = storage {
        let record = process_record(&process_id, spec.name, &sheet_label, ctx, base, 0, false, start_ms);
        if let Err(e) = db.upsert_process(&record).await {
            warn!(error = %e, "failed to record active process");
        }
    }

    let result = run_waves(
        jobs,
        spec,
        request.custom_prompt.clone(),
        completer,
        ctx,
        base,
        options.wave_size,
    )
    .await;

    // Apply accumulated deltas through the store. Price steps write and
    // tint individual cells; text steps rewrite the whole target column.
    let mut write_errors: Vec<String> = Vec::new();
    if !result.deltas.is_empty() {
        match spec.tint {
            Some(color) => {
                for delta in &result.deltas {
                    if let Err(e) = store.write_cell(cols.target, delta.row_number, &delta.value).await
                    {
                        write_errors.push(format!(
                            "Row {}: failed to write to sheet: {e}",
                            delta.row_number
                        ));
                        continue;
                    }
                    if let Err(e) = store
                        .set_cell_background(cols.target, delta.row_number, color)
                        .await
                    {
                        warn!(row = delta.row_number, error = %e, "failed to tint cell");
                    }
                }
            }
            None => {
                let mut values: Vec<String> = grid
                    .rows
                    .iter()
                    .map(|row| cell(row, cols.target).to_string())
                    .collect();
                for delta in &result.deltas {
                    if delta.index < values.len() {
                        values[delta.index] = delta.value.clone();
                    }
                }
                if let Err(e) = store.write_column(cols.target, &values).await {
                    write_errors.push(format!("failed to write column to sheet: {e}"));
                }
            }
        }
    }

    let elapsed = start.elapsed();

    if let Some(db) = storage {
        let message = format!(
            "{} filled, {} errors, {} skipped",
            result.deltas.len(),
            result.stats.errors,
            result.stats.skipped
        );
        if let Err(e) = db
            .append_history(
                &sheet_label,
                Some(spec.name),
                &message,
                &Utc::now().to_rfc3339(),
                &format_elapsed(elapsed),
            )
            .await
        {
            warn!(error = %e, "failed to append history");
        }

        let dispatchable = result.stats.total.saturating_sub(result.stats.skipped);
        let progress = if dispatchable == 0 {
            1.0
        } else {
            result.stats.processed as f64 / dispatchable as f64
        };
        let record = process_record(
            &process_id,
            spec.name,
            &sheet_label,
            ctx,
            result.stats,
            elapsed.as_secs() as i64,
            true,
            start_ms,
        );
        let record = ProcessRecord { progress, ..record };
        if let Err(e) = db.upsert_process(&record).await {
            warn!(error = %e, "failed to finalize process record");
        }
    }

    let status = match result.outcome {
        RunOutcome::Completed => {
            ctx.emit(&ProgressEvent::Complete {
                step: spec.name.to_string(),
                stats: result.stats,
            });
            RunStatus::Ok
        }
        // The scheduler already emitted the cancelled event with frozen
        // counters.
        RunOutcome::Cancelled => RunStatus::Cancelled,
        RunOutcome::Halted => {
            let message = result
                .critical
                .clone()
                .unwrap_or_else(|| "critical API failure".to_string());
            ctx.emit(&ProgressEvent::Error {
                step: spec.name.to_string(),
                message,
                stats: result.stats,
            });
            RunStatus::Error
        }
    };

    let mut errors: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
    errors.extend(write_errors);

    info!(
        status = ?status,
        success = result.stats.success,
        errors = result.stats.errors,
        skipped = result.stats.skipped,
        filled = result.deltas.len(),
        elapsed_ms = elapsed.as_millis(),
        "run finished"
    );

    Ok(ProcessResponse {
        status,
        step: spec.name.to_string(),
        errors,
        stats: result.stats,
    })
}

#[allow(clippy::too_many_arguments)]
fn process_record(
    process_id: &ProcessId,
    step_name: &str,
    sheet_label: &str,
    ctx: &SessionContext,
    stats: RunStats,
    elapsed_secs: i64,
    completed: bool,
    start_time: i64,
) -> ProcessRecord {
    ProcessRecord {
        process_id: process_id.to_string(),
        step_name: step_name.to_string(),
        sheet_name: sheet_label.to_string(),
        session_id: ctx.session_id.clone(),
        stats,
        elapsed_secs,
        is_completed: completed,
        is_active: !completed,
        progress: 0.0,
        start_time,
    }
}

/// Human-readable elapsed-time string for history records.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
