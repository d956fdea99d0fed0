//! Policyflow Jobs
//!
//! Background work for the automation engine: the durable queue that
//! asynchronous actions and event fan-out are pushed onto, the recurring job
//! registrations backing periodic triggers, and the short-lived lock that
//! serializes registration sweeps.
//!
//! Each concern is a trait so the engine can be exercised against the
//! in-memory implementations; [`SqliteJobStore`] implements all three on a
//! single SQLite database.

mod memory;
mod sqlite;
mod types;

pub use memory::InMemoryJobStore;
pub use sqlite::SqliteJobStore;
pub use types::{
  AsyncActionJob, Job, JobPayload, JobRecord, JobStatus, PeriodicTriggerJob, RecurringJob,
  TriggerAutomationJob,
};

use std::time::Duration;

use async_trait::async_trait;

/// Error type for job storage operations.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
  /// The requested job was not found.
  #[error("job not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// A payload could not be encoded or decoded.
  #[error("job payload error: {0}")]
  Payload(#[from] serde_json::Error),
}

/// A durable, partitioned job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
  /// Store a job; returns its id.
  async fn enqueue(&self, job: Job) -> Result<String, JobError>;

  /// Claim the oldest enqueued job of `queue`, marking it processing.
  async fn dequeue(&self, queue: &str) -> Result<Option<JobRecord>, JobError>;

  async fn mark_succeeded(&self, job_id: &str) -> Result<(), JobError>;

  async fn mark_failed(&self, job_id: &str, error: &str) -> Result<(), JobError>;

  async fn get_job(&self, job_id: &str) -> Result<JobRecord, JobError>;
}

/// Registrations of cron-scheduled jobs, keyed by job id.
#[async_trait]
pub trait RecurringJobManager: Send + Sync {
  async fn add_or_update(&self, job: RecurringJob) -> Result<(), JobError>;

  async fn remove(&self, job_id: &str) -> Result<(), JobError>;

  /// Ids of every registration whose id starts with `prefix`.
  async fn list_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, JobError>;

  async fn get_recurring(&self, job_id: &str) -> Result<Option<RecurringJob>, JobError>;
}

/// A named lock shared between processes.
#[async_trait]
pub trait DistributedLock: Send + Sync {
  /// Take the lock unless someone else holds it; it expires after `ttl`.
  /// Returns `false` without waiting when it is taken.
  async fn try_acquire(&self, resource: &str, ttl: Duration) -> Result<bool, JobError>;

  async fn release(&self, resource: &str) -> Result<(), JobError>;
}
