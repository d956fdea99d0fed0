use std::sync::Arc;

use policyflow_automation::EngineError;
use policyflow_jobs::{JobPayload, JobQueue, JobRecord};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::entry::AutomationDispatcher;
use crate::error::DispatchError;
use crate::handler::AsynchronousActionHandler;

/// How a processed job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
  Succeeded,
  Failed,
}

/// Totals of one [`JobWorker::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkSummary {
  pub succeeded: usize,
  pub failed: usize,
}

/// Takes automation jobs off the queue and runs them.
pub struct JobWorker {
  jobs: Arc<dyn JobQueue>,
  queue: String,
  dispatcher: Arc<AutomationDispatcher>,
  handler: AsynchronousActionHandler,
}

impl JobWorker {
  pub fn new(jobs: Arc<dyn JobQueue>, dispatcher: Arc<AutomationDispatcher>) -> Self {
    let queue = dispatcher.settings().automation_queue.clone();
    let handler = AsynchronousActionHandler::new(dispatcher.provider().clone());
    Self {
      jobs,
      queue,
      dispatcher,
      handler,
    }
  }

  /// Process the oldest waiting job, if any.
  ///
  /// A job that fails is marked failed with the error text; only queue
  /// errors are returned.
  pub async fn run_once(&self, cancel: &CancellationToken) -> Result<Option<JobOutcome>, DispatchError> {
    let Some(record) = self.jobs.dequeue(&self.queue).await? else {
      return Ok(None);
    };
    self.process(&record, cancel).await.map(Some)
  }

  /// Process jobs until the queue is empty or `cancel` fires.
  #[instrument(name = "job_worker_drain", skip(self, cancel), fields(queue = %self.queue))]
  pub async fn drain(&self, cancel: &CancellationToken) -> Result<WorkSummary, DispatchError> {
    let mut summary = WorkSummary::default();
    while !cancel.is_cancelled() {
      match self.run_once(cancel).await? {
        Some(JobOutcome::Succeeded) => summary.succeeded += 1,
        Some(JobOutcome::Failed) => summary.failed += 1,
        None => break,
      }
    }
    info!(
      succeeded = summary.succeeded,
      failed = summary.failed,
      "job_worker_drained"
    );
    Ok(summary)
  }

  #[instrument(
    name = "job_process",
    skip(self, record, cancel),
    fields(job_id = %record.job_id, display_name = %record.display_name)
  )]
  async fn process(
    &self,
    record: &JobRecord,
    cancel: &CancellationToken,
  ) -> Result<JobOutcome, DispatchError> {
    let result = match &record.payload {
      JobPayload::AutomationAction(job) => self.handler.handle(job, cancel).await,
      JobPayload::TriggerAutomation(job) => self.dispatcher.run_triggered(job, cancel).await,
      JobPayload::PeriodicTrigger(job) => self.dispatcher.run_periodic(job, cancel).await,
    };

    match result {
      Ok(()) => {
        self.jobs.mark_succeeded(&record.job_id).await?;
        info!("job_succeeded");
        Ok(JobOutcome::Succeeded)
      }
      Err(error) => {
        let message = match &error {
          DispatchError::Engine(EngineError::Raised(raised)) => {
            serde_json::to_string(raised).unwrap_or_else(|_| raised.to_string())
          }
          other => other.to_string(),
        };
        warn!(error = %error, "job_failed");
        self.jobs.mark_failed(&record.job_id, &message).await?;
        Ok(JobOutcome::Failed)
      }
    }
  }
}
