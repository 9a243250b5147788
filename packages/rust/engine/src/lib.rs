//! Batched asynchronous row-enrichment engine for AssetPilot.
//!
//! One generic pipeline (filter → build prompt → call API → parse → write
//! delta → classify error) drives every enrichment step; the steps differ
//! only in the parameter sets defined in [`kinds`]. Scheduling is
//! wave-based with cooperative cancellation and live progress reporting.

pub mod filter;
pub mod kinds;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod scheduler;
pub mod session;

pub use filter::{EnrichmentJob, SkipCounts, StepColumns, resolve_step_columns, select_jobs};
pub use kinds::{EnrichmentKind, Field, StepSpec};
pub use parse::{Parsed, ResponseParser, format_price, normalize_price};
pub use pipeline::{RunOptions, preflight, run_step};
pub use prompt::{JobFields, apply_template};
pub use scheduler::{
    RowDelta, RowError, RunOutcome, ScheduleResult, WAVE_SIZE, run_waves,
};
pub use session::{MemorySink, NullSink, ProgressSink, SessionContext, SessionRegistry};
