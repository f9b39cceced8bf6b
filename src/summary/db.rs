use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::{SummaryProgress, SummaryResult, SummaryStatus};
use super::store::SummaryStore;
use crate::errors::StoreError;

/// Durable `SummaryStore` backed by a single SQLite file.
///
/// The connection sits behind `Arc<Mutex>` and every statement runs on tokio's
/// blocking pool via `spawn_blocking`. A snapshot is one row, written by one
/// statement.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn).context("Failed to run migrations")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Database(anyhow::anyhow!("Store task panicked: {}", e)))?
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS summary_progress (
            request_id TEXT PRIMARY KEY,
            current_document_index INTEGER NOT NULL,
            total_documents INTEGER NOT NULL,
            current_summary TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS summary_results (
            request_id TEXT PRIMARY KEY,
            summary TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            error_message TEXT,
            completed_at TEXT
        );
        ",
    )
    .context("Failed to create summary tables")?;
    Ok(())
}

fn parse_status(request_id: &str, raw: &str) -> Result<SummaryStatus, StoreError> {
    raw.parse().map_err(|message| StoreError::CorruptRecord {
        request_id: request_id.to_string(),
        message,
    })
}

fn parse_timestamp(request_id: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord {
            request_id: request_id.to_string(),
            message: format!("invalid timestamp '{}': {}", raw, e),
        })
}

fn parse_count(request_id: &str, raw: i64) -> Result<usize, StoreError> {
    usize::try_from(raw).map_err(|_| StoreError::CorruptRecord {
        request_id: request_id.to_string(),
        message: format!("negative document count {}", raw),
    })
}

/// (index, total, summary, status, updated_at) as stored.
type ProgressRow = (i64, i64, String, String, String);

fn progress_from_row(request_id: String, row: ProgressRow) -> Result<SummaryProgress, StoreError> {
    let (index, total, summary, status, updated_at) = row;
    Ok(SummaryProgress {
        current_document_index: parse_count(&request_id, index)?,
        total_documents: parse_count(&request_id, total)?,
        current_summary: summary,
        status: parse_status(&request_id, &status)?,
        updated_at: parse_timestamp(&request_id, &updated_at)?,
        request_id,
    })
}

#[async_trait]
impl SummaryStore for SqliteStore {
    async fn save_progress(&self, progress: &SummaryProgress) -> Result<(), StoreError> {
        let progress = progress.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO summary_progress
                    (request_id, current_document_index, total_documents, current_summary, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(request_id) DO UPDATE SET
                    current_document_index = excluded.current_document_index,
                    total_documents = excluded.total_documents,
                    current_summary = excluded.current_summary,
                    status = excluded.status,
                    updated_at = excluded.updated_at",
                params![
                    progress.request_id,
                    progress.current_document_index as i64,
                    progress.total_documents as i64,
                    progress.current_summary,
                    progress.status.as_str(),
                    progress.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_progress(&self, request_id: &str) -> Result<Option<SummaryProgress>, StoreError> {
        let request_id = request_id.to_string();
        self.call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT current_document_index, total_documents, current_summary, status, updated_at
                     FROM summary_progress WHERE request_id = ?1",
                    params![request_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|row| progress_from_row(request_id, row)).transpose()
        })
        .await
    }

    async fn save_result(&self, result: &SummaryResult) -> Result<(), StoreError> {
        let result = result.clone();
        self.call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO summary_results
                    (request_id, summary, status, error_message, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    result.request_id,
                    result.summary,
                    result.status.as_str(),
                    result.error_message,
                    result.completed_at.map(|ts| ts.to_rfc3339()),
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::ResultAlreadyRecorded {
                    request_id: result.request_id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn get_result(&self, request_id: &str) -> Result<Option<SummaryResult>, StoreError> {
        let request_id = request_id.to_string();
        self.call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT summary, status, error_message, completed_at
                     FROM summary_results WHERE request_id = ?1",
                    params![request_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((summary, status, error_message, completed_at)) = row else {
                return Ok(None);
            };
            let completed_at = completed_at
                .map(|raw| parse_timestamp(&request_id, &raw))
                .transpose()?;
            Ok(Some(SummaryResult {
                summary,
                status: parse_status(&request_id, &status)?,
                error_message,
                completed_at,
                request_id,
            }))
        })
        .await
    }

    async fn unfinished_requests(&self) -> Result<Vec<SummaryProgress>, StoreError> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.request_id, p.current_document_index, p.total_documents,
                        p.current_summary, p.status, p.updated_at
                 FROM summary_progress p
                 LEFT JOIN summary_results r ON r.request_id = p.request_id
                 WHERE r.request_id IS NULL
                 ORDER BY p.updated_at",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        (
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ),
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(request_id, row)| progress_from_row(request_id, row))
                .collect()
        })
        .await
    }
}
