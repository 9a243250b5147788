//! Core domain types and collaborator wire shapes for AssetPilot.
//!
//! The `ProcessRequest`/`ProcessResponse` pair is the JSON contract of the
//! HTTP collaborator endpoint; [`ProgressEvent`] is the per-session channel
//! payload. The engine produces these shapes, the transport layer only
//! forwards them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ProcessId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline-run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub Uuid);

impl ProcessId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProcessId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Process request / response
// ---------------------------------------------------------------------------

/// Request body accepted by the process endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Spreadsheet identifier (adapter-specific: document id or file path).
    pub sheet_id: String,
    /// Enrichment step to run (display name or slug).
    #[serde(alias = "step_name")]
    pub step: String,
    /// Tab name within the spreadsheet, if the adapter needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    /// Session identifier correlating this run with a progress channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Caller-supplied prompt template overriding the step default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// All waves completed (possibly with row-level errors).
    Ok,
    /// The run stopped early on a user cancellation.
    Cancelled,
    /// The run halted on a critical API error.
    Error,
}

/// Response body returned by the process endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: RunStatus,
    pub step: String,
    /// Human-readable error messages accumulated during the run.
    pub errors: Vec<String>,
    pub stats: RunStats,
}

/// Aggregate counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Rows considered (the full data range).
    pub total: usize,
    /// Jobs that finished, successfully or not.
    pub processed: usize,
    /// Jobs whose result was written back.
    pub success: usize,
    /// Jobs that failed with a row-level or critical error.
    pub errors: usize,
    /// Rows excluded by the filter (already filled or missing data).
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

/// Event payload broadcast on the per-session progress channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Running totals after an individual job completion.
    Progress {
        step: String,
        #[serde(flatten)]
        stats: RunStats,
    },
    /// Terminal event: all waves finished.
    Complete {
        step: String,
        #[serde(flatten)]
        stats: RunStats,
    },
    /// Terminal event: the run stopped on a cancellation request, with
    /// counters frozen at their current values.
    Cancelled {
        step: String,
        #[serde(flatten)]
        stats: RunStats,
    },
    /// Terminal event: the run halted on a critical error.
    Error {
        step: String,
        message: String,
        #[serde(flatten)]
        stats: RunStats,
    },
}

impl ProgressEvent {
    /// The step name this event belongs to.
    pub fn step(&self) -> &str {
        match self {
            Self::Progress { step, .. }
            | Self::Complete { step, .. }
            | Self::Cancelled { step, .. }
            | Self::Error { step, .. } => step,
        }
    }

    /// The counters snapshot carried by this event.
    pub fn stats(&self) -> &RunStats {
        match self {
            Self::Progress { stats, .. }
            | Self::Complete { stats, .. }
            | Self::Cancelled { stats, .. }
            | Self::Error { stats, .. } => stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_id_roundtrip() {
        let id = ProcessId::new();
        let s = id.to_string();
        let parsed: ProcessId = s.parse().expect("parse ProcessId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn process_request_optional_fields() {
        let json = r#"{"sheet_id":"abc123","step":"Build Description"}"#;
        let req: ProcessRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(req.sheet_id, "abc123");
        assert!(req.session_id.is_none());
        assert!(req.custom_prompt.is_none());
    }

    #[test]
    fn process_request_accepts_step_name_alias() {
        let json = r#"{"sheet_id":"abc123","step_name":"comparables","session_id":"s1"}"#;
        let req: ProcessRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(req.step, "comparables");
        assert_eq!(req.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn progress_event_wire_shape() {
        let event = ProgressEvent::Progress {
            step: "Build Description".into(),
            stats: RunStats {
                total: 45,
                processed: 3,
                success: 2,
                errors: 1,
                skipped: 5,
            },
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains(r#""type":"progress"#));
        assert!(json.contains(r#""processed":3"#));
        assert!(json.contains(r#""skipped":5"#));

        let parsed: ProgressEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, event);
    }

    #[test]
    fn error_event_carries_message() {
        let event = ProgressEvent::Error {
            step: "Extract Price".into(),
            message: "CRITICAL: API quota exceeded".into(),
            stats: RunStats::default(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains(r#""type":"error"#));
        assert!(json.contains("quota exceeded"));
    }

    #[test]
    fn run_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Cancelled).unwrap(),
            r#""cancelled""#
        );
    }
}
