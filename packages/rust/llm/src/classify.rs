//! Failure classification for completion calls.
//!
//! An HTTP-like status of 400, 401, or 429 means the whole run is doomed
//! (bad request, auth failure, quota exhaustion) and must halt immediately;
//! everything else is recorded against its row and processing continues.

use assetpilot_shared::AssetPilotError;

/// How a completion failure affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Halts the entire run.
    Critical,
    /// Recorded against the row; remaining rows keep processing.
    RowLevel,
}

/// Classify a completion failure.
pub fn classify(err: &AssetPilotError) -> FailureClass {
    match err.status() {
        Some(400) | Some(401) | Some(429) => FailureClass::Critical,
        _ => FailureClass::RowLevel,
    }
}

/// Operator-facing message for a critical API failure.
pub fn critical_message(status: u16, detail: &str) -> String {
    match status {
        401 => format!(
            "CRITICAL: API authentication failed. Please check your API key. Error: {detail}"
        ),
        400 => format!("CRITICAL: Invalid API request. Error: {detail}"),
        429 => format!(
            "CRITICAL: API quota exceeded. Please check your API credits. Error: {detail}"
        ),
        other => format!("CRITICAL: API error (code {other}). Error: {detail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> AssetPilotError {
        AssetPilotError::Api {
            status: Some(status),
            message: "detail".into(),
        }
    }

    #[test]
    fn auth_quota_and_bad_request_are_critical() {
        for status in [400, 401, 429] {
            assert_eq!(classify(&api_error(status)), FailureClass::Critical);
        }
    }

    #[test]
    fn other_failures_are_row_level() {
        assert_eq!(classify(&api_error(500)), FailureClass::RowLevel);
        assert_eq!(classify(&api_error(503)), FailureClass::RowLevel);
        assert_eq!(
            classify(&AssetPilotError::Network("timeout".into())),
            FailureClass::RowLevel
        );
        assert_eq!(
            classify(&AssetPilotError::parse("bad json")),
            FailureClass::RowLevel
        );
    }

    #[test]
    fn critical_messages_name_the_cause() {
        assert!(critical_message(401, "x").contains("authentication"));
        assert!(critical_message(429, "x").contains("quota"));
        assert!(critical_message(400, "x").contains("Invalid API request"));
        assert!(critical_message(418, "x").contains("code 418"));
    }
}
