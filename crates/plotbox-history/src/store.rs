//! Execution history storage.

use crate::{HistoryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use plotbox_core::{ExecutionResult, RunId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::debug;

/// One recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub user_id: UserId,
    pub code: String,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,

    #[serde(rename = "execution_time")]
    pub execution_time_seconds: f64,

    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    /// Build a record from a finished run.
    pub fn new(user: &UserId, code: &str, result: &ExecutionResult, at: DateTime<Utc>) -> Self {
        Self {
            id: RunId::new(),
            user_id: user.clone(),
            code: code.to_string(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            success: result.success,
            execution_time_seconds: result.execution_time_seconds,
            created_at: at,
        }
    }
}

/// Start of the window of `window_seconds` ending at `now`.
pub fn window_start(now: DateTime<Utc>, window_seconds: f64) -> DateTime<Utc> {
    let millis = (window_seconds.max(0.0) * 1000.0).min(i64::MAX as f64) as i64;
    now.checked_sub_signed(Duration::milliseconds(millis))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Append-only, per-user log of runs.
///
/// Windows are closed intervals `[now - window, now]`.
#[async_trait]
pub trait ExecutionHistory: Send + Sync {
    /// Append a finished run.
    async fn record_run(
        &self,
        user: &UserId,
        code: &str,
        result: &ExecutionResult,
        at: DateTime<Utc>,
    ) -> Result<RunRecord>;

    /// Sum of execution times of the user's runs inside the window.
    async fn total_cpu_seconds_since(
        &self,
        user: &UserId,
        window_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<f64>;

    /// Timestamp of the user's most recent run.
    async fn last_run_timestamp(&self, user: &UserId) -> Result<Option<DateTime<Utc>>>;

    /// Timestamp of the user's oldest run inside the window.
    async fn oldest_run_timestamp_within_window(
        &self,
        user: &UserId,
        window_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// The user's most recent runs, newest first.
    async fn list_runs(&self, user: &UserId, limit: usize) -> Result<Vec<RunRecord>>;
}

/// In-memory history.
pub struct MemoryHistory {
    runs: RwLock<HashMap<UserId, Vec<RunRecord>>>,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }

    async fn in_window(
        &self,
        user: &UserId,
        window_seconds: f64,
        now: DateTime<Utc>,
    ) -> Vec<RunRecord> {
        let since = window_start(now, window_seconds);
        let runs = self.runs.read().await;
        runs.get(user)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.created_at >= since && r.created_at <= now)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionHistory for MemoryHistory {
    async fn record_run(
        &self,
        user: &UserId,
        code: &str,
        result: &ExecutionResult,
        at: DateTime<Utc>,
    ) -> Result<RunRecord> {
        let record = RunRecord::new(user, code, result, at);
        let mut runs = self.runs.write().await;
        runs.entry(user.clone()).or_default().push(record.clone());
        Ok(record)
    }

    async fn total_cpu_seconds_since(
        &self,
        user: &UserId,
        window_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        Ok(self
            .in_window(user, window_seconds, now)
            .await
            .iter()
            .map(|r| r.execution_time_seconds)
            .sum())
    }

    async fn last_run_timestamp(&self, user: &UserId) -> Result<Option<DateTime<Utc>>> {
        let runs = self.runs.read().await;
        Ok(runs
            .get(user)
            .and_then(|records| records.iter().map(|r| r.created_at).max()))
    }

    async fn oldest_run_timestamp_within_window(
        &self,
        user: &UserId,
        window_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .in_window(user, window_seconds, now)
            .await
            .iter()
            .map(|r| r.created_at)
            .min())
    }

    async fn list_runs(&self, user: &UserId, limit: usize) -> Result<Vec<RunRecord>> {
        let runs = self.runs.read().await;
        let mut records = runs.get(user).cloned().unwrap_or_default();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}

/// SQLite-backed history.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let filename = options.clone().get_filename();
        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        debug!(url, "Opened history database");
        Self::with_pool(pool).await
    }

    /// A private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        // A single connection, since each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    /// Use an existing pool, creating the schema if needed.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let history = Self { pool };
        history.init_tables().await?;
        Ok(history)
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS program_runs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                code TEXT NOT NULL,
                stdout TEXT NOT NULL,
                stderr TEXT NOT NULL,
                success INTEGER NOT NULL,
                execution_time REAL NOT NULL,
                created_at_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_program_runs_user_created \
             ON program_runs(user_id, created_at_ms)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| HistoryError::corrupt(format!("timestamp out of range: {}", ms)))
}

fn record_from_row(row: &SqliteRow) -> Result<RunRecord> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    Ok(RunRecord {
        id: RunId::parse(&id).ok_or_else(|| HistoryError::corrupt(format!("bad run id: {}", id)))?,
        user_id: UserId::new(user_id),
        code: row.try_get("code")?,
        stdout: row.try_get("stdout")?,
        stderr: row.try_get("stderr")?,
        success: row.try_get("success")?,
        execution_time_seconds: row.try_get("execution_time")?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
    })
}

#[async_trait]
impl ExecutionHistory for SqliteHistory {
    async fn record_run(
        &self,
        user: &UserId,
        code: &str,
        result: &ExecutionResult,
        at: DateTime<Utc>,
    ) -> Result<RunRecord> {
        let record = RunRecord::new(user, code, result, at);
        sqlx::query(
            "INSERT INTO program_runs \
             (id, user_id, code, stdout, stderr, success, execution_time, created_at_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.user_id.as_str())
        .bind(&record.code)
        .bind(&record.stdout)
        .bind(&record.stderr)
        .bind(record.success)
        .bind(record.execution_time_seconds)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn total_cpu_seconds_since(
        &self,
        user: &UserId,
        window_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        let total: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(execution_time), 0.0) FROM program_runs \
             WHERE user_id = ? AND created_at_ms >= ? AND created_at_ms <= ?",
        )
        .bind(user.as_str())
        .bind(window_start(now, window_seconds).timestamp_millis())
        .bind(now.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn last_run_timestamp(&self, user: &UserId) -> Result<Option<DateTime<Utc>>> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(created_at_ms) FROM program_runs WHERE user_id = ?")
                .bind(user.as_str())
                .fetch_one(&self.pool)
                .await?;
        last.map(from_millis).transpose()
    }

    async fn oldest_run_timestamp_within_window(
        &self,
        user: &UserId,
        window_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let oldest: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(created_at_ms) FROM program_runs \
             WHERE user_id = ? AND created_at_ms >= ? AND created_at_ms <= ?",
        )
        .bind(user.as_str())
        .bind(window_start(now, window_seconds).timestamp_millis())
        .bind(now.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;
        oldest.map(from_millis).transpose()
    }

    async fn list_runs(&self, user: &UserId, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, code, stdout, stderr, success, execution_time, created_at_ms \
             FROM program_runs WHERE user_id = ? \
             ORDER BY created_at_ms DESC, rowid DESC LIMIT ?",
        )
        .bind(user.as_str())
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}
