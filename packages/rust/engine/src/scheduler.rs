//! Wave-based batch scheduler.
//!
//! Jobs are partitioned into consecutive waves of a fixed maximum size;
//! within a wave every job's task is dispatched concurrently and the whole
//! wave is awaited before the next one starts. This caps simultaneous
//! outbound API calls while keeping per-wave accounting simple. The
//! cancellation flag is consulted before each wave; a critical API failure
//! stops the run after the wave that produced it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use assetpilot_llm::{ChatCompleter, ChatMessage, FailureClass, classify, critical_message};
use assetpilot_shared::{AssetPilotError, ProgressEvent, RunStats};

use crate::filter::EnrichmentJob;
use crate::kinds::StepSpec;
use crate::parse::Parsed;
use crate::prompt::apply_template;
use crate::session::SessionContext;

/// Maximum jobs dispatched concurrently per wave.
pub const WAVE_SIZE: usize = 20;

/// A successful enrichment: one value bound for one row's target cell.
/// The scheduler never mutates the grid itself; the pipeline applies
/// deltas through the sheet store, keeping the data flow auditable.
#[derive(Debug, Clone)]
pub struct RowDelta {
    /// Index into the data-row array.
    pub index: usize,
    /// 1-based display row number on the sheet.
    pub row_number: usize,
    /// Normalized value to write.
    pub value: String,
}

/// One recorded failure. Never mutated after append.
#[derive(Debug, Clone)]
pub struct RowError {
    pub row_number: Option<usize>,
    pub status: Option<u16>,
    pub message: String,
    /// Critical failures halt the run; row-level failures do not.
    pub critical: bool,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.critical {
            write!(f, "{}", self.message)
        } else {
            match self.row_number {
                Some(n) => write!(f, "Row {n}: {}", self.message),
                None => write!(f, "{}", self.message),
            }
        }
    }
}

/// How a scheduled run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every wave ran to completion.
    Completed,
    /// The cancellation flag was observed between waves.
    Cancelled,
    /// A critical API failure stopped the run.
    Halted,
}

/// Accumulated output of a scheduled run.
#[derive(Debug)]
pub struct ScheduleResult {
    pub outcome: RunOutcome,
    pub stats: RunStats,
    pub errors: Vec<RowError>,
    pub deltas: Vec<RowDelta>,
    /// The message of the critical failure, when `outcome` is `Halted`.
    pub critical: Option<String>,
}

/// State shared by all concurrently executing tasks of one run. Counters
/// and the error list are only ever touched inside the mutex.
struct Shared {
    stats: RunStats,
    errors: Vec<RowError>,
    deltas: Vec<RowDelta>,
    critical: Option<String>,
}

/// Drive `jobs` through the completer in bounded waves.
///
/// `base` seeds the counters with the run's `total` and `skipped` values so
/// every emitted progress event carries full running totals.
pub async fn run_waves(
    jobs: Vec<EnrichmentJob>,
    spec: &'static StepSpec,
    custom_prompt: Option<String>,
    completer: Arc<dyn ChatCompleter>,
    ctx: &SessionContext,
    base: RunStats,
    wave_size: usize,
) -> ScheduleResult {
    let wave_size = wave_size.max(1);
    let wave_count = jobs.len().div_ceil(wave_size);
    let custom: Option<Arc<str>> = custom_prompt.map(|s| Arc::from(s.into_boxed_str()));

    let shared = Arc::new(Mutex::new(Shared {
        stats: base,
        errors: Vec::new(),
        deltas: Vec::new(),
        critical: None,
    }));

    let mut remaining = jobs;
    let mut outcome = RunOutcome::Completed;
    let mut wave_index = 0usize;

    while !remaining.is_empty() {
        if ctx.is_cancelled() {
            outcome = RunOutcome::Cancelled;
            break;
        }

        wave_index += 1;
        let count = remaining.len().min(wave_size);
        let wave: Vec<EnrichmentJob> = remaining.drain(..count).collect();
        tracing::debug!(
            step = spec.name,
            wave = wave_index,
            waves = wave_count,
            jobs = wave.len(),
            "dispatching wave"
        );

        let mut handles = Vec::with_capacity(wave.len());
        for job in wave {
            let completer = Arc::clone(&completer);
            let ctx = ctx.clone();
            let shared = Arc::clone(&shared);
            let custom = custom.clone();
            handles.push(tokio::spawn(async move {
                run_job(job, spec, custom.as_deref(), completer, ctx, shared).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                let mut s = shared.lock().await;
                s.stats.errors += 1;
                s.stats.processed += 1;
                s.errors.push(RowError {
                    row_number: None,
                    status: None,
                    message: format!("task join error: {e}"),
                    critical: false,
                });
            }
        }

        if shared.lock().await.critical.is_some() {
            outcome = RunOutcome::Halted;
            break;
        }
    }

    let inner = match Arc::try_unwrap(shared) {
        Ok(mutex) => mutex.into_inner(),
        Err(arc) => {
            let guard = arc.lock().await;
            Shared {
                stats: guard.stats,
                errors: guard.errors.clone(),
                deltas: guard.deltas.clone(),
                critical: guard.critical.clone(),
            }
        }
    };

    if outcome == RunOutcome::Cancelled {
        // Counters are frozen at their pre-wave values; jobs never
        // dispatched stay undispatched.
        tracing::info!(step = spec.name, "run cancelled between waves");
        ctx.emit(&ProgressEvent::Cancelled {
            step: spec.name.to_string(),
            stats: inner.stats,
        });
    }

    ScheduleResult {
        outcome,
        stats: inner.stats,
        errors: inner.errors,
        deltas: inner.deltas,
        critical: inner.critical,
    }
}

/// Execute one enrichment task: build the prompt, call the API, parse the
/// response, record the outcome, emit a progress update.
async fn run_job(
    job: EnrichmentJob,
    spec: &'static StepSpec,
    custom: Option<&str>,
    completer: Arc<dyn ChatCompleter>,
    ctx: SessionContext,
    shared: Arc<Mutex<Shared>>,
) {
    // Cooperative cancellation: a task observing the flag before starting
    // work returns silently — no result, no error.
    if ctx.is_cancelled() {
        return;
    }

    let prompt = match custom {
        Some(template) => apply_template(template, &job.fields),
        None => (spec.prompt)(&job.fields),
    };

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = spec.system_prompt {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));

    let call = completer
        .complete(&messages, spec.max_tokens, spec.temperature)
        .await;

    let mut s = shared.lock().await;
    match call {
        Ok(raw) => match spec.parser.parse(&raw) {
            Ok(Parsed::Value(value)) => {
                s.stats.success += 1;
                s.stats.processed += 1;
                tracing::debug!(row = job.row_number, step = spec.name, "row enriched");
                s.deltas.push(RowDelta {
                    index: job.index,
                    row_number: job.row_number,
                    value,
                });
            }
            Ok(Parsed::NoResult) => {
                s.stats.success += 1;
                s.stats.processed += 1;
                tracing::debug!(row = job.row_number, step = spec.name, "no usable result");
            }
            Err(message) => {
                s.stats.errors += 1;
                s.stats.processed += 1;
                tracing::warn!(row = job.row_number, step = spec.name, %message, "response rejected");
                s.errors.push(RowError {
                    row_number: Some(job.row_number),
                    status: None,
                    message,
                    critical: false,
                });
            }
        },
        Err(err) => {
            s.stats.errors += 1;
            s.stats.processed += 1;
            record_failure(&mut s, job.row_number, err);
        }
    }

    // Per-completion progress with running totals, emitted inside the
    // mutual-exclusion scope so totals stay monotonic on the channel.
    let event = ProgressEvent::Progress {
        step: spec.name.to_string(),
        stats: s.stats,
    };
    ctx.emit(&event);
}

fn record_failure(s: &mut Shared, row_number: usize, err: AssetPilotError) {
    match classify(&err) {
        FailureClass::Critical => {
            let status = err.status().unwrap_or_default();
            let message = critical_message(status, &err.to_string());
            tracing::error!(row = row_number, %message, "critical API failure");
            // One terminal error per run; concurrent repeats only count.
            if s.critical.is_none() {
                s.critical = Some(message.clone());
                s.errors.push(RowError {
                    row_number: Some(row_number),
                    status: err.status(),
                    message,
                    critical: true,
                });
            }
        }
        FailureClass::RowLevel => {
            tracing::warn!(row = row_number, error = %err, "row-level failure");
            s.errors.push(RowError {
                row_number: Some(row_number),
                status: err.status(),
                message: format!("API error: {err}"),
                critical: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::kinds::EnrichmentKind;
    use crate::prompt::JobFields;
    use crate::session::{MemorySink, NullSink};

    fn jobs(n: usize) -> Vec<EnrichmentJob> {
        (0..n)
            .map(|i| EnrichmentJob {
                index: i,
                row_number: i + 3,
                fields: JobFields {
                    asset: format!("asset-{i}"),
                    tech: "173 hp".into(),
                    ..Default::default()
                },
            })
            .collect()
    }

    fn base(total: usize, skipped: usize) -> RunStats {
        RunStats {
            total,
            skipped,
            ..Default::default()
        }
    }

    /// Scripted completer tracking call volume and concurrency.
    struct Scripted {
        calls: AtomicUsize,
        active: AtomicUsize,
        high_water: AtomicUsize,
        fail_with: Option<u16>,
        response: String,
        cancel_at: Option<(usize, SessionContext)>,
    }

    impl Scripted {
        fn ok(response: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
                fail_with: None,
                response: response.into(),
                cancel_at: None,
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                fail_with: Some(status),
                ..Self::ok("")
            }
        }
    }

    #[async_trait]
    impl ChatCompleter for Scripted {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _max_tokens: u32,
            _temperature: f32,
        ) -> assetpilot_shared::Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if let Some((at, ctx)) = &self.cancel_at {
                if call == *at {
                    ctx.cancel();
                }
            }

            match self.fail_with {
                Some(status) => Err(AssetPilotError::Api {
                    status: Some(status),
                    message: "simulated".into(),
                }),
                None => Ok(self.response.clone()),
            }
        }
    }

    #[tokio::test]
    async fn waves_bound_concurrency() {
        let spec = EnrichmentKind::Description.spec();
        let completer = Arc::new(Scripted::ok("A generated description."));
        let ctx = SessionContext::detached(Arc::new(NullSink));

        let result = run_waves(
            jobs(7),
            spec,
            None,
            completer.clone(),
            &ctx,
            base(7, 0),
            3,
        )
        .await;

        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(completer.calls.load(Ordering::SeqCst), 7);
        assert!(completer.high_water.load(Ordering::SeqCst) <= 3);
        assert_eq!(result.stats.success, 7);
        assert_eq!(result.deltas.len(), 7);
    }

    #[tokio::test]
    async fn counters_include_base_totals() {
        let spec = EnrichmentKind::Description.spec();
        let completer = Arc::new(Scripted::ok("text"));
        let sink = Arc::new(MemorySink::new());
        let ctx = SessionContext::detached(sink.clone());

        let result = run_waves(jobs(4), spec, None, completer, &ctx, base(9, 5), 20).await;

        assert_eq!(result.stats.total, 9);
        assert_eq!(result.stats.skipped, 5);
        assert_eq!(result.stats.success, 4);
        assert_eq!(result.stats.processed, 4);
        // success + errors + skipped == total rows considered
        assert_eq!(
            result.stats.success + result.stats.errors + result.stats.skipped,
            result.stats.total
        );

        // One progress event per completion, totals monotonically rising.
        let processed: Vec<usize> = sink
            .events()
            .iter()
            .map(|e| e.stats().processed)
            .collect();
        assert_eq!(processed.len(), 4);
        assert!(processed.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn rejected_responses_become_row_errors() {
        let spec = EnrichmentKind::ExtractPrice.spec();
        let completer = Arc::new(Scripted::ok("Call for Price"));
        let ctx = SessionContext::detached(Arc::new(NullSink));

        let mut all = jobs(2);
        for job in &mut all {
            job.fields.comparable = "Condition: Used, Price: $1, URL: u".into();
        }
        let result = run_waves(all, spec, None, completer, &ctx, base(2, 0), 20).await;

        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.stats.errors, 2);
        assert!(result.deltas.is_empty());
        assert!(result.errors.iter().all(|e| !e.critical));
        assert!(result.errors[0].to_string().starts_with("Row "));
    }

    #[tokio::test]
    async fn critical_failure_halts_after_its_wave() {
        let spec = EnrichmentKind::Description.spec();
        let completer = Arc::new(Scripted::failing(401));
        let ctx = SessionContext::detached(Arc::new(NullSink));

        let result = run_waves(jobs(5), spec, None, completer.clone(), &ctx, base(5, 0), 2).await;

        assert_eq!(result.outcome, RunOutcome::Halted);
        // Only the first wave was dispatched.
        assert_eq!(completer.calls.load(Ordering::SeqCst), 2);
        // Exactly one critical entry, even though both tasks failed.
        let criticals: Vec<_> = result.errors.iter().filter(|e| e.critical).collect();
        assert_eq!(criticals.len(), 1);
        assert!(criticals[0].message.contains("authentication"));
        assert_eq!(result.critical.as_deref(), Some(criticals[0].message.as_str()));
        assert_eq!(result.stats.errors, 2);
    }

    #[tokio::test]
    async fn cancellation_stops_dispatch_between_waves() {
        let spec = EnrichmentKind::Description.spec();
        let sink = Arc::new(MemorySink::new());
        let ctx = SessionContext::detached(sink.clone());

        // The flag flips while the second (and last) call of wave 1 is in
        // flight, so wave 1 lands fully and wave 2 is never dispatched.
        let completer = Arc::new(Scripted {
            cancel_at: Some((2, ctx.clone())),
            ..Scripted::ok("done")
        });

        let result = run_waves(jobs(6), spec, None, completer.clone(), &ctx, base(6, 0), 2).await;

        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert_eq!(completer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.stats.success, 2);
        assert_eq!(result.deltas.len(), 2);

        let events = sink.events();
        let last = events.last().expect("events emitted");
        assert!(matches!(last, ProgressEvent::Cancelled { .. }));
        assert_eq!(last.stats().success, 2);
    }

    #[tokio::test]
    async fn zero_jobs_complete_immediately() {
        let spec = EnrichmentKind::Description.spec();
        let completer = Arc::new(Scripted::ok("x"));
        let ctx = SessionContext::detached(Arc::new(NullSink));

        let result = run_waves(Vec::new(), spec, None, completer, &ctx, base(3, 3), 20).await;
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.stats.skipped, 3);
        assert_eq!(result.stats.processed, 0);
    }
}
