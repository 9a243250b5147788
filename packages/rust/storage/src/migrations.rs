//! SQL migration definitions for the AssetPilot database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: history, active_processes",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only run history
CREATE TABLE IF NOT EXISTS history (
    id         TEXT PRIMARY KEY,
    sheet_name TEXT NOT NULL,
    step       TEXT,
    message    TEXT NOT NULL,
    timestamp  TEXT NOT NULL,
    time       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_sheet ON history(sheet_name);
CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);

-- Live run monitor, upserted by process id
CREATE TABLE IF NOT EXISTS active_processes (
    process_id   TEXT PRIMARY KEY,
    step_name    TEXT NOT NULL,
    sheet_name   TEXT NOT NULL,
    session_id   TEXT NOT NULL,
    stats_json   TEXT NOT NULL,
    elapsed_secs INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER NOT NULL DEFAULT 0,
    is_active    INTEGER NOT NULL DEFAULT 1,
    progress     REAL NOT NULL DEFAULT 0,
    start_time   INTEGER NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_active_processes_session ON active_processes(session_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
