use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::{
  DistributedLock, Job, JobError, JobPayload, JobQueue, JobRecord, JobStatus, RecurringJob,
  RecurringJobManager,
};

const SCHEMA: &[&str] = &[
  r#"
  CREATE TABLE IF NOT EXISTS jobs (
    job_id TEXT PRIMARY KEY,
    queue TEXT NOT NULL,
    display_name TEXT NOT NULL,
    payload TEXT NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    enqueued_at TEXT NOT NULL,
    completed_at TEXT
  )
  "#,
  "CREATE INDEX IF NOT EXISTS jobs_queue_status ON jobs (queue, status)",
  r#"
  CREATE TABLE IF NOT EXISTS recurring_jobs (
    job_id TEXT PRIMARY KEY,
    cron_expression TEXT NOT NULL,
    time_zone_id TEXT NOT NULL,
    queue TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
  )
  "#,
  r#"
  CREATE TABLE IF NOT EXISTS locks (
    resource TEXT PRIMARY KEY,
    expires_at TEXT NOT NULL
  )
  "#,
];

#[derive(FromRow)]
struct JobRow {
  job_id: String,
  queue: String,
  display_name: String,
  payload: Json<JobPayload>,
  status: JobStatus,
  attempts: i64,
  error: Option<String>,
  enqueued_at: DateTime<Utc>,
}

impl From<JobRow> for JobRecord {
  fn from(row: JobRow) -> Self {
    Self {
      job_id: row.job_id,
      queue: row.queue,
      display_name: row.display_name,
      payload: row.payload.0,
      status: row.status,
      attempts: row.attempts,
      error: row.error,
      enqueued_at: row.enqueued_at,
    }
  }
}

#[derive(FromRow)]
struct RecurringRow {
  job_id: String,
  cron_expression: String,
  time_zone_id: String,
  queue: String,
  payload: Json<JobPayload>,
}

/// SQLite-backed job queue, recurring job manager and lock.
#[derive(Clone)]
pub struct SqliteJobStore {
  pool: SqlitePool,
}

impl SqliteJobStore {
  /// Create a new store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database at `url` and apply the schema.
  pub async fn connect(url: &str) -> Result<Self, JobError> {
    let options: sqlx::sqlite::SqliteConnectOptions = url.parse()?;
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
      .max_connections(if url.contains(":memory:") { 1 } else { 4 })
      .connect_with(options.create_if_missing(true))
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Create the tables if they do not exist.
  pub async fn migrate(&self) -> Result<(), JobError> {
    for statement in SCHEMA {
      sqlx::query(statement).execute(&self.pool).await?;
    }
    Ok(())
  }
}

#[async_trait]
impl JobQueue for SqliteJobStore {
  async fn enqueue(&self, job: Job) -> Result<String, JobError> {
    let job_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
      r#"
      INSERT INTO jobs (job_id, queue, display_name, payload, status, attempts, enqueued_at)
      VALUES (?, ?, ?, ?, ?, 0, ?)
      "#,
    )
    .bind(&job_id)
    .bind(&job.queue)
    .bind(&job.display_name)
    .bind(Json(&job.payload))
    .bind(JobStatus::Enqueued)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    debug!(job_id = %job_id, queue = %job.queue, display_name = %job.display_name, "job_enqueued");
    Ok(job_id)
  }

  async fn dequeue(&self, queue: &str) -> Result<Option<JobRecord>, JobError> {
    let row: Option<JobRow> = sqlx::query_as(
      r#"
      UPDATE jobs
      SET status = ?, attempts = attempts + 1
      WHERE job_id = (
        SELECT job_id FROM jobs
        WHERE queue = ? AND status = ?
        ORDER BY rowid ASC
        LIMIT 1
      )
      RETURNING job_id, queue, display_name, payload, status, attempts, error, enqueued_at
      "#,
    )
    .bind(JobStatus::Processing)
    .bind(queue)
    .bind(JobStatus::Enqueued)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row.map(JobRecord::from))
  }

  async fn mark_succeeded(&self, job_id: &str) -> Result<(), JobError> {
    let result = sqlx::query(
      r#"
      UPDATE jobs
      SET status = ?, error = NULL, completed_at = ?
      WHERE job_id = ?
      "#,
    )
    .bind(JobStatus::Succeeded)
    .bind(Utc::now())
    .bind(job_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(JobError::NotFound(job_id.to_string()));
    }
    Ok(())
  }

  async fn mark_failed(&self, job_id: &str, error: &str) -> Result<(), JobError> {
    let result = sqlx::query(
      r#"
      UPDATE jobs
      SET status = ?, error = ?, completed_at = ?
      WHERE job_id = ?
      "#,
    )
    .bind(JobStatus::Failed)
    .bind(error)
    .bind(Utc::now())
    .bind(job_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(JobError::NotFound(job_id.to_string()));
    }
    Ok(())
  }

  async fn get_job(&self, job_id: &str) -> Result<JobRecord, JobError> {
    let row: Option<JobRow> = sqlx::query_as(
      r#"
      SELECT job_id, queue, display_name, payload, status, attempts, error, enqueued_at
      FROM jobs
      WHERE job_id = ?
      "#,
    )
    .bind(job_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .map(JobRecord::from)
      .ok_or_else(|| JobError::NotFound(job_id.to_string()))
  }
}

#[async_trait]
impl RecurringJobManager for SqliteJobStore {
  async fn add_or_update(&self, job: RecurringJob) -> Result<(), JobError> {
    sqlx::query(
      r#"
      INSERT INTO recurring_jobs (job_id, cron_expression, time_zone_id, queue, payload, updated_at)
      VALUES (?, ?, ?, ?, ?, ?)
      ON CONFLICT (job_id) DO UPDATE SET
        cron_expression = excluded.cron_expression,
        time_zone_id = excluded.time_zone_id,
        queue = excluded.queue,
        payload = excluded.payload,
        updated_at = excluded.updated_at
      "#,
    )
    .bind(&job.job_id)
    .bind(&job.cron_expression)
    .bind(&job.time_zone_id)
    .bind(&job.queue)
    .bind(Json(&job.payload))
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn remove(&self, job_id: &str) -> Result<(), JobError> {
    sqlx::query("DELETE FROM recurring_jobs WHERE job_id = ?")
      .bind(job_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn list_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, JobError> {
    // substr avoids LIKE treating '_' and '%' in aliases as wildcards.
    let ids: Vec<(String,)> = sqlx::query_as(
      r#"
      SELECT job_id FROM recurring_jobs
      WHERE substr(job_id, 1, length(?)) = ?
      ORDER BY job_id ASC
      "#,
    )
    .bind(prefix)
    .bind(prefix)
    .fetch_all(&self.pool)
    .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
  }

  async fn get_recurring(&self, job_id: &str) -> Result<Option<RecurringJob>, JobError> {
    let row: Option<RecurringRow> = sqlx::query_as(
      r#"
      SELECT job_id, cron_expression, time_zone_id, queue, payload
      FROM recurring_jobs
      WHERE job_id = ?
      "#,
    )
    .bind(job_id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row.map(|row| RecurringJob {
      job_id: row.job_id,
      cron_expression: row.cron_expression,
      time_zone_id: row.time_zone_id,
      queue: row.queue,
      payload: row.payload.0,
    }))
  }
}

#[async_trait]
impl DistributedLock for SqliteJobStore {
  async fn try_acquire(&self, resource: &str, ttl: Duration) -> Result<bool, JobError> {
    let now = Utc::now();
    let expires_at =
      now + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));

    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM locks WHERE resource = ? AND expires_at <= ?")
      .bind(resource)
      .bind(now)
      .execute(&mut *tx)
      .await?;
    let inserted = sqlx::query("INSERT OR IGNORE INTO locks (resource, expires_at) VALUES (?, ?)")
      .bind(resource)
      .bind(expires_at)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;

    Ok(inserted.rows_affected() == 1)
  }

  async fn release(&self, resource: &str) -> Result<(), JobError> {
    sqlx::query("DELETE FROM locks WHERE resource = ?")
      .bind(resource)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}
