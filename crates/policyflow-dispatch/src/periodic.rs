use std::sync::Arc;

use policyflow_jobs::{
  DistributedLock, JobPayload, PeriodicTriggerJob, RecurringJob, RecurringJobManager,
};
use tracing::{debug, info, instrument, warn};

use crate::error::DispatchError;
use crate::provider::{ConfigurationProvider, ReleaseContext};
use crate::settings::DispatchSettings;

/// Lock held while every deployment's periodic jobs are re-registered.
pub const REGISTRATION_LOCK: &str = "periodic-trigger-registration";

/// Keeps recurring job registrations in step with the periodic triggers of
/// the deployed configurations.
pub struct PeriodicRegistrar {
  provider: Arc<dyn ConfigurationProvider>,
  recurring: Arc<dyn RecurringJobManager>,
  lock: Arc<dyn DistributedLock>,
  settings: DispatchSettings,
}

impl PeriodicRegistrar {
  pub fn new(
    provider: Arc<dyn ConfigurationProvider>,
    recurring: Arc<dyn RecurringJobManager>,
    lock: Arc<dyn DistributedLock>,
    settings: DispatchSettings,
  ) -> Self {
    Self {
      provider,
      recurring,
      lock,
      settings,
    }
  }

  /// Replace the registrations of one deployment.
  ///
  /// Every registration of the tenant's product and environment is removed
  /// first, so triggers deleted from the configuration stop firing. Job ids
  /// carry no tenant: registrations another tenant made under the same
  /// prefix are left alone, but one with the same trigger alias is
  /// overwritten. Returns the number of registrations made.
  #[instrument(
    name = "periodic_register",
    skip(self, release),
    fields(
      tenant = %release.tenant_alias,
      product = %release.product_alias,
      environment = %release.environment
    )
  )]
  pub async fn register(&self, release: &ReleaseContext) -> Result<usize, DispatchError> {
    let prefix = job_id_prefix(&release.product_alias, &release.environment);
    let mut stale = Vec::new();
    for job_id in self.recurring.list_ids_with_prefix(&prefix).await? {
      let owner = match self.recurring.get_recurring(&job_id).await? {
        Some(RecurringJob {
          payload: JobPayload::PeriodicTrigger(job),
          ..
        }) => Some(job.tenant_alias),
        _ => None,
      };
      if let Some(owner) = owner
        && owner != release.tenant_alias
      {
        debug!(job_id = %job_id, owner = %owner, "periodic_job_kept");
        continue;
      }
      self.recurring.remove(&job_id).await?;
      stale.push(job_id);
    }

    let Some(configuration) = self.provider.configuration(release).await? else {
      info!(removed = stale.len(), "periodic_jobs_removed");
      return Ok(0);
    };
    let mut registered = 0;
    for (automation, schedule) in configuration.periodic_triggers() {
      let job = RecurringJob {
        job_id: format!("{}{}", prefix, schedule.trigger_alias),
        cron_expression: schedule.cron_expression.to_string(),
        time_zone_id: schedule.time_zone_id.unwrap_or("UTC").to_string(),
        queue: self.settings.automation_queue.clone(),
        payload: JobPayload::PeriodicTrigger(PeriodicTriggerJob {
          tenant_alias: release.tenant_alias.clone(),
          product_alias: release.product_alias.clone(),
          environment: release.environment.clone(),
          automation_alias: automation.alias().to_string(),
          trigger_alias: schedule.trigger_alias.to_string(),
        }),
      };
      self.recurring.add_or_update(job).await?;
      registered += 1;
    }
    info!(removed = stale.len(), registered, "periodic_jobs_registered");
    Ok(registered)
  }

  /// Re-register the periodic jobs of every deployment, one at a time.
  ///
  /// Returns `None` without doing anything when another sweep holds the
  /// registration lock.
  #[instrument(name = "periodic_register_all", skip(self))]
  pub async fn register_all(&self) -> Result<Option<usize>, DispatchError> {
    let acquired = self
      .lock
      .try_acquire(REGISTRATION_LOCK, self.settings.periodic_lock_timeout)
      .await?;
    if !acquired {
      info!("periodic_registration_skipped");
      return Ok(None);
    }

    let result = self.register_releases().await;
    // An unreleased lock expires after its timeout.
    if let Err(error) = self.lock.release(REGISTRATION_LOCK).await {
      warn!(%error, "periodic_registration_unlock_failed");
    }
    result.map(Some)
  }

  async fn register_releases(&self) -> Result<usize, DispatchError> {
    let mut registered = 0;
    for release in self.provider.list().await? {
      registered += self.register(&release).await?;
    }
    Ok(registered)
  }
}

/// Registrations of one product and environment share this prefix.
pub fn job_id_prefix(product_alias: &str, environment: &str) -> String {
  format!("{}-{}-", product_alias, environment)
}
