//! libSQL persistence layer for AssetPilot.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the
//! append-only run history and the live-process monitor table. The engine
//! writes both during a run and never reads them back; the history and
//! monitor views are read by the CLI and by the HTTP collaborator.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use uuid::Uuid;

use assetpilot_shared::{AssetPilotError, Result, RunStats};

/// One row of the append-only history log.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: String,
    pub sheet_name: String,
    pub step: Option<String>,
    pub message: String,
    /// Caller-supplied wall-clock timestamp (ISO date).
    pub timestamp: String,
    /// Caller-supplied elapsed-time display string.
    pub time: String,
}

/// One row of the live-process monitor table.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub process_id: String,
    pub step_name: String,
    pub sheet_name: String,
    pub session_id: String,
    pub stats: RunStats,
    pub elapsed_secs: i64,
    pub is_completed: bool,
    pub is_active: bool,
    /// Completion fraction in `[0, 1]`.
    pub progress: f64,
    /// Caller-supplied start time (unix millis).
    pub start_time: i64,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AssetPilotError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    AssetPilotError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // History operations
    // -----------------------------------------------------------------------

    /// Append a history record. Returns the generated record ID.
    pub async fn append_history(
        &self,
        sheet_name: &str,
        step: Option<&str>,
        message: &str,
        timestamp: &str,
        time: &str,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO history (id, sheet_name, step, message, timestamp, time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.as_str(),
                    sheet_name,
                    step,
                    message,
                    timestamp,
                    time,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// List history records, newest first, optionally filtered by sheet name.
    pub async fn list_history(
        &self,
        limit: usize,
        sheet_name: Option<&str>,
    ) -> Result<Vec<HistoryEntry>> {
        let mut rows = match sheet_name {
            Some(sheet) => self
                .conn
                .query(
                    "SELECT id, sheet_name, step, message, timestamp, time FROM history
                     WHERE sheet_name = ?1 ORDER BY timestamp DESC LIMIT ?2",
                    params![sheet, limit as i64],
                )
                .await,
            None => self
                .conn
                .query(
                    "SELECT id, sheet_name, step, message, timestamp, time FROM history
                     ORDER BY timestamp DESC LIMIT ?1",
                    params![limit as i64],
                )
                .await,
        }
        .map_err(|e| AssetPilotError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(HistoryEntry {
                id: row
                    .get::<String>(0)
                    .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
                sheet_name: row
                    .get::<String>(1)
                    .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
                step: row.get::<String>(2).ok(),
                message: row
                    .get::<String>(3)
                    .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
                timestamp: row
                    .get::<String>(4)
                    .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
                time: row
                    .get::<String>(5)
                    .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
            });
        }
        Ok(results)
    }

    /// Delete all history records.
    pub async fn clear_history(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM history", params![])
            .await
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Active process operations
    // -----------------------------------------------------------------------

    /// Insert or update a process record (upsert by `process_id`).
    pub async fn upsert_process(&self, record: &ProcessRecord) -> Result<()> {
        let stats_json = serde_json::to_string(&record.stats)
            .map_err(|e| AssetPilotError::Storage(format!("serialize stats: {e}")))?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO active_processes
                   (process_id, step_name, sheet_name, session_id, stats_json,
                    elapsed_secs, is_completed, is_active, progress, start_time, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(process_id) DO UPDATE SET
                   step_name = excluded.step_name,
                   sheet_name = excluded.sheet_name,
                   session_id = excluded.session_id,
                   stats_json = excluded.stats_json,
                   elapsed_secs = excluded.elapsed_secs,
                   is_completed = excluded.is_completed,
                   is_active = excluded.is_active,
                   progress = excluded.progress,
                   start_time = excluded.start_time,
                   updated_at = excluded.updated_at",
                params![
                    record.process_id.as_str(),
                    record.step_name.as_str(),
                    record.sheet_name.as_str(),
                    record.session_id.as_str(),
                    stats_json.as_str(),
                    record.elapsed_secs,
                    record.is_completed as i64,
                    record.is_active as i64,
                    record.progress,
                    record.start_time,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List all process records, most recently updated first.
    pub async fn list_processes(&self) -> Result<Vec<ProcessRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT process_id, step_name, sheet_name, session_id, stats_json,
                        elapsed_secs, is_completed, is_active, progress, start_time
                 FROM active_processes ORDER BY updated_at DESC",
                params![],
            )
            .await
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_process_record(&row)?);
        }
        Ok(results)
    }

    /// Delete a process record by ID.
    pub async fn delete_process(&self, process_id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM active_processes WHERE process_id = ?1",
                params![process_id],
            )
            .await
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Convert a database row to a [`ProcessRecord`].
fn row_to_process_record(row: &libsql::Row) -> Result<ProcessRecord> {
    let stats_json: String = row
        .get(4)
        .map_err(|e| AssetPilotError::Storage(e.to_string()))?;
    let stats: RunStats = serde_json::from_str(&stats_json)
        .map_err(|e| AssetPilotError::Storage(format!("invalid stats json: {e}")))?;

    Ok(ProcessRecord {
        process_id: row
            .get::<String>(0)
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
        step_name: row
            .get::<String>(1)
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
        sheet_name: row
            .get::<String>(2)
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
        session_id: row
            .get::<String>(3)
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
        stats,
        elapsed_secs: row
            .get::<i64>(5)
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
        is_completed: row.get::<i64>(6).map(|v| v != 0).unwrap_or(false),
        is_active: row.get::<i64>(7).map(|v| v != 0).unwrap_or(false),
        progress: row
            .get::<f64>(8)
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
        start_time: row
            .get::<i64>(9)
            .map_err(|e| AssetPilotError::Storage(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ap_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ap_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn history_append_and_list() {
        let storage = test_storage().await;

        let id = storage
            .append_history(
                "Structured Data",
                Some("Build Description"),
                "12 filled, 0 errors, 3 skipped",
                "2025-06-01T10:00:00Z",
                "1m 42s",
            )
            .await
            .expect("append");
        assert!(!id.is_empty());

        storage
            .append_history(
                "Other Sheet",
                Some("Extract Price"),
                "5 filled",
                "2025-06-01T11:00:00Z",
                "40s",
            )
            .await
            .expect("append second");

        let all = storage.list_history(100, None).await.expect("list");
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].sheet_name, "Other Sheet");

        let filtered = storage
            .list_history(100, Some("Structured Data"))
            .await
            .expect("filtered");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].step.as_deref(), Some("Build Description"));

        storage.clear_history().await.expect("clear");
        let empty = storage.list_history(100, None).await.expect("list empty");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn process_upsert_and_delete() {
        let storage = test_storage().await;

        let mut record = ProcessRecord {
            process_id: Uuid::now_v7().to_string(),
            step_name: "AI Source Comparables".into(),
            sheet_name: "Structured Data".into(),
            session_id: "session-1".into(),
            stats: RunStats {
                total: 45,
                processed: 10,
                success: 9,
                errors: 1,
                skipped: 0,
            },
            elapsed_secs: 30,
            is_completed: false,
            is_active: true,
            progress: 0.22,
            start_time: 1_748_700_000_000,
        };

        storage.upsert_process(&record).await.expect("insert");

        record.progress = 1.0;
        record.is_completed = true;
        record.is_active = false;
        storage.upsert_process(&record).await.expect("upsert");

        let processes = storage.list_processes().await.expect("list");
        assert_eq!(processes.len(), 1);
        assert!(processes[0].is_completed);
        assert_eq!(processes[0].stats.success, 9);

        storage
            .delete_process(&record.process_id)
            .await
            .expect("delete");
        assert!(storage.list_processes().await.unwrap().is_empty());
    }
}
