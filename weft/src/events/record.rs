//! Execution records and their stores.
//!
//! One record per execution with the status lifecycle
//! `pending → running → (completed | failed | cancelled)`; terminal states
//! never transition again. The SQLite store follows the open-per-operation,
//! `spawn_blocking` pattern; the in-memory store backs tests.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store failure (I/O, serialization, or constraint).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Execution lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    fn from_str(s: &str) -> ExecutionStatus {
        match s {
            "running" => ExecutionStatus::Running,
            "completed" => ExecutionStatus::Completed,
            "failed" => ExecutionStatus::Failed,
            "cancelled" => ExecutionStatus::Cancelled,
            _ => ExecutionStatus::Pending,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub owner_id: String,
    pub definition_id: Option<String>,
    pub template_id: Option<String>,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tokens_used: u64,
    pub cost: f64,
    pub execution_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        definition_id: Option<String>,
        template_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            definition_id,
            template_id,
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            tokens_used: 0,
            cost: 0.0,
            execution_time_ms: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Execution record store collaborator. Writes are short transactions; a
/// failed write is logged by the caller and never affects event delivery.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: ExecutionRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError>;

    /// `pending → running` with the start time. No-op on terminal records.
    async fn mark_running(&self, id: &str, started_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// `running → completed` with final accounting. No-op on terminal
    /// records.
    async fn mark_completed(
        &self,
        id: &str,
        completed_at: DateTime<Utc>,
        tokens_used: u64,
        cost: f64,
        execution_time_ms: u64,
    ) -> Result<(), StoreError>;

    /// `running → failed | cancelled` with the error message. No-op on
    /// terminal records.
    async fn mark_finished(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Result<(), StoreError>;

    /// Updates running token/cost totals on a live record.
    async fn update_usage(&self, id: &str, tokens_used: u64, cost: f64) -> Result<(), StoreError>;
}

/// In-memory record store for tests.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: DashMap<String, ExecutionRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn mark_running(&self, id: &str, started_at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(mut record) = self.records.get_mut(id) {
            if !record.status.is_terminal() {
                record.status = ExecutionStatus::Running;
                record.started_at = Some(started_at);
            }
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: &str,
        completed_at: DateTime<Utc>,
        tokens_used: u64,
        cost: f64,
        execution_time_ms: u64,
    ) -> Result<(), StoreError> {
        if let Some(mut record) = self.records.get_mut(id) {
            if !record.status.is_terminal() {
                record.status = ExecutionStatus::Completed;
                record.completed_at = Some(completed_at);
                record.tokens_used = tokens_used;
                record.cost = cost;
                record.execution_time_ms = Some(execution_time_ms);
            }
        }
        Ok(())
    }

    async fn mark_finished(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        if let Some(mut record) = self.records.get_mut(id) {
            if !record.status.is_terminal() {
                record.status = status;
                record.completed_at = Some(completed_at);
                record.error_message = error_message;
            }
        }
        Ok(())
    }

    async fn update_usage(&self, id: &str, tokens_used: u64, cost: f64) -> Result<(), StoreError> {
        if let Some(mut record) = self.records.get_mut(id) {
            if !record.status.is_terminal() {
                record.tokens_used = tokens_used;
                record.cost = cost;
            }
        }
        Ok(())
    }
}

/// SQLite-backed record store. Opens a connection per operation inside
/// `spawn_blocking`; terminal-status guards live in the WHERE clauses.
pub struct SqliteRecordStore {
    db_path: std::path::PathBuf,
}

impl SqliteRecordStore {
    /// Creates the store and ensures the table exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS execution_records (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                definition_id TEXT,
                template_id TEXT,
                status TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                tokens_used INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0,
                execution_time_ms INTEGER,
                error_message TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(Self { db_path })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            f(&conn).map_err(|e| StoreError::Storage(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<ExecutionRecord, rusqlite::Error> {
    let parse_ts = |value: Option<String>| {
        value.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|t| t.with_timezone(&Utc)))
    };
    let status: String = row.get("status")?;
    Ok(ExecutionRecord {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        definition_id: row.get("definition_id")?,
        template_id: row.get("template_id")?,
        status: ExecutionStatus::from_str(&status),
        started_at: parse_ts(row.get("started_at")?),
        completed_at: parse_ts(row.get("completed_at")?),
        tokens_used: row.get::<_, i64>("tokens_used")? as u64,
        cost: row.get("cost")?,
        execution_time_ms: row.get::<_, Option<i64>>("execution_time_ms")?.map(|v| v as u64),
        error_message: row.get("error_message")?,
        created_at: parse_ts(row.get("created_at")?).unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO execution_records
                (id, owner_id, definition_id, template_id, status, started_at, completed_at,
                 tokens_used, cost, execution_time_ms, error_message, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    record.id,
                    record.owner_id,
                    record.definition_id,
                    record.template_id,
                    record.status.as_str(),
                    record.started_at.map(|t| t.to_rfc3339()),
                    record.completed_at.map(|t| t.to_rfc3339()),
                    record.tokens_used as i64,
                    record.cost,
                    record.execution_time_ms.map(|v| v as i64),
                    record.error_message,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT * FROM execution_records WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn mark_running(&self, id: &str, started_at: DateTime<Utc>) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE execution_records SET status = 'running', started_at = ?2
                 WHERE id = ?1 AND status IN ('pending', 'running')",
                params![id, started_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_completed(
        &self,
        id: &str,
        completed_at: DateTime<Utc>,
        tokens_used: u64,
        cost: f64,
        execution_time_ms: u64,
    ) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE execution_records
                 SET status = 'completed', completed_at = ?2, tokens_used = ?3, cost = ?4,
                     execution_time_ms = ?5
                 WHERE id = ?1 AND status IN ('pending', 'running')",
                params![
                    id,
                    completed_at.to_rfc3339(),
                    tokens_used as i64,
                    cost,
                    execution_time_ms as i64
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_finished(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE execution_records
                 SET status = ?2, completed_at = ?3, error_message = ?4
                 WHERE id = ?1 AND status IN ('pending', 'running')",
                params![
                    id,
                    status.as_str(),
                    completed_at.to_rfc3339(),
                    error_message
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_usage(&self, id: &str, tokens_used: u64, cost: f64) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE execution_records SET tokens_used = ?2, cost = ?3
                 WHERE id = ?1 AND status IN ('pending', 'running')",
                params![id, tokens_used as i64, cost],
            )?;
            Ok(())
        })
        .await
    }
}
