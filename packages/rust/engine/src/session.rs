//! Session-scoped run context: cancellation flag plus progress sink.
//!
//! A session correlates one pipeline run with one progress/cancellation
//! channel. The flag starts false when a session is first seen, is set by
//! an external cancel request, and is only read (never reset) during a
//! run; it is cleared when the session is torn down via
//! [`SessionRegistry::remove`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use assetpilot_shared::{ProgressEvent, Result};

/// Receiver side of the per-session progress channel.
///
/// Emission failures must never fail the enrichment work that produced
/// them: callers log and swallow errors (see [`SessionContext::emit`]).
pub trait ProgressSink: Send + Sync {
    fn emit(&self, session_id: &str, event: &ProgressEvent) -> Result<()>;
}

/// Sink that drops every event (headless runs, tests).
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _session_id: &str, _event: &ProgressEvent) -> Result<()> {
        Ok(())
    }
}

/// Sink that buffers events in memory. Used by tests and by transports
/// that drain events asynchronously.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event emitted so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, _session_id: &str, event: &ProgressEvent) -> Result<()> {
        self.events.lock().expect("sink lock poisoned").push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session registry
// ---------------------------------------------------------------------------

/// Process-wide cancellation flags keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's flag, created unset on first access.
    pub fn flag(&self, session_id: &str) -> Arc<AtomicBool> {
        let mut flags = self.flags.lock().expect("registry lock poisoned");
        flags
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// Request cancellation of a session's run.
    pub fn cancel(&self, session_id: &str) {
        tracing::info!(session_id, "cancellation requested");
        self.flag(session_id).store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self, session_id: &str) -> bool {
        self.flag(session_id).load(Ordering::SeqCst)
    }

    /// Tear a session down, discarding its flag.
    pub fn remove(&self, session_id: &str) {
        let mut flags = self.flags.lock().expect("registry lock poisoned");
        flags.remove(session_id);
    }
}

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// Everything a run needs from its session: identity, cancellation flag,
/// and the progress sink. Created at run start, discarded at run end.
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: String,
    cancel: Arc<AtomicBool>,
    sink: Arc<dyn ProgressSink>,
}

impl SessionContext {
    /// Context bound to a registry-managed session.
    pub fn new(session_id: &str, registry: &SessionRegistry, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            session_id: session_id.to_string(),
            cancel: registry.flag(session_id),
            sink,
        }
    }

    /// Context with a private flag, for runs without an external session.
    pub fn detached(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            session_id: String::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            sink,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Set this context's cancellation flag directly (signal handlers,
    /// tests).
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Emit a progress event. A failed emission is logged and swallowed —
    /// losing a progress update must not fail the enrichment work.
    pub fn emit(&self, event: &ProgressEvent) {
        if let Err(e) = self.sink.emit(&self.session_id, event) {
            tracing::warn!(session_id = %self.session_id, error = %e, "progress emission failed");
        }
    }
}
