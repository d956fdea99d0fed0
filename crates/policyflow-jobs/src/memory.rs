use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::{
  DistributedLock, Job, JobError, JobQueue, JobRecord, JobStatus, RecurringJob,
  RecurringJobManager,
};

#[derive(Default)]
struct Inner {
  jobs: Vec<JobRecord>,
  recurring: BTreeMap<String, RecurringJob>,
  locks: HashMap<String, Instant>,
}

/// Process-local job store. State is shared between clones.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
  inner: Arc<Mutex<Inner>>,
}

impl InMemoryJobStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of every job ever enqueued, in enqueue order.
  pub fn jobs(&self) -> Vec<JobRecord> {
    self.inner.lock().jobs.clone()
  }

  /// Snapshot of all recurring registrations, ordered by id.
  pub fn recurring_jobs(&self) -> Vec<RecurringJob> {
    self.inner.lock().recurring.values().cloned().collect()
  }
}

#[async_trait]
impl JobQueue for InMemoryJobStore {
  async fn enqueue(&self, job: Job) -> Result<String, JobError> {
    let job_id = uuid::Uuid::new_v4().to_string();
    let record = JobRecord {
      job_id: job_id.clone(),
      queue: job.queue,
      display_name: job.display_name,
      payload: job.payload,
      status: JobStatus::Enqueued,
      attempts: 0,
      error: None,
      enqueued_at: Utc::now(),
    };
    self.inner.lock().jobs.push(record);
    Ok(job_id)
  }

  async fn dequeue(&self, queue: &str) -> Result<Option<JobRecord>, JobError> {
    let mut inner = self.inner.lock();
    let next = inner
      .jobs
      .iter_mut()
      .find(|job| job.queue == queue && job.status == JobStatus::Enqueued);
    Ok(next.map(|job| {
      job.status = JobStatus::Processing;
      job.attempts += 1;
      job.clone()
    }))
  }

  async fn mark_succeeded(&self, job_id: &str) -> Result<(), JobError> {
    let mut inner = self.inner.lock();
    let job = find_mut(&mut inner.jobs, job_id)?;
    job.status = JobStatus::Succeeded;
    job.error = None;
    Ok(())
  }

  async fn mark_failed(&self, job_id: &str, error: &str) -> Result<(), JobError> {
    let mut inner = self.inner.lock();
    let job = find_mut(&mut inner.jobs, job_id)?;
    job.status = JobStatus::Failed;
    job.error = Some(error.to_string());
    Ok(())
  }

  async fn get_job(&self, job_id: &str) -> Result<JobRecord, JobError> {
    let mut inner = self.inner.lock();
    find_mut(&mut inner.jobs, job_id).map(|job| job.clone())
  }
}

fn find_mut<'a>(jobs: &'a mut [JobRecord], job_id: &str) -> Result<&'a mut JobRecord, JobError> {
  jobs
    .iter_mut()
    .find(|job| job.job_id == job_id)
    .ok_or_else(|| JobError::NotFound(job_id.to_string()))
}

#[async_trait]
impl RecurringJobManager for InMemoryJobStore {
  async fn add_or_update(&self, job: RecurringJob) -> Result<(), JobError> {
    self
      .inner
      .lock()
      .recurring
      .insert(job.job_id.clone(), job);
    Ok(())
  }

  async fn remove(&self, job_id: &str) -> Result<(), JobError> {
    self.inner.lock().recurring.remove(job_id);
    Ok(())
  }

  async fn list_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, JobError> {
    let inner = self.inner.lock();
    Ok(
      inner
        .recurring
        .keys()
        .filter(|id| id.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }

  async fn get_recurring(&self, job_id: &str) -> Result<Option<RecurringJob>, JobError> {
    Ok(self.inner.lock().recurring.get(job_id).cloned())
  }
}

#[async_trait]
impl DistributedLock for InMemoryJobStore {
  async fn try_acquire(&self, resource: &str, ttl: Duration) -> Result<bool, JobError> {
    let mut inner = self.inner.lock();
    let now = Instant::now();
    match inner.locks.get(resource) {
      Some(expires) if *expires > now => Ok(false),
      _ => {
        inner.locks.insert(resource.to_string(), now + ttl);
        Ok(true)
      }
    }
  }

  async fn release(&self, resource: &str) -> Result<(), JobError> {
    self.inner.lock().locks.remove(resource);
    Ok(())
  }
}
