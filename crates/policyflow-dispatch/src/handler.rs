use std::sync::Arc;

use policyflow_automation::AutomationData;
use policyflow_jobs::AsyncActionJob;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::DispatchError;
use crate::provider::{ConfigurationProvider, ReleaseContext};

/// Continues asynchronous actions taken off the job queue.
pub struct AsynchronousActionHandler {
  provider: Arc<dyn ConfigurationProvider>,
}

impl AsynchronousActionHandler {
  pub fn new(provider: Arc<dyn ConfigurationProvider>) -> Self {
    Self { provider }
  }

  /// Run the queued action against the automation data it was queued with.
  ///
  /// A configuration or automation that no longer exists drops the job with
  /// a warning. Missing data for a nested action, or an action that ends
  /// with an error, is returned to the caller.
  #[instrument(
    name = "async_action_handle",
    skip(self, job, cancel),
    fields(
      tenant = %job.tenant_alias,
      automation_alias = %job.automation_alias,
      action_alias = %job.action_alias
    )
  )]
  pub async fn handle(
    &self,
    job: &AsyncActionJob,
    cancel: &CancellationToken,
  ) -> Result<(), DispatchError> {
    let mut data = AutomationData::from_json(&job.automation_data_json)?;
    let product_alias = job
      .product_alias
      .clone()
      .or_else(|| data.automation.product_alias.clone())
      .ok_or_else(|| DispatchError::ProductNotResolved {
        tenant_alias: job.tenant_alias.clone(),
      })?;
    let environment = job
      .environment
      .clone()
      .unwrap_or_else(|| data.automation.environment.clone());
    let release = ReleaseContext::new(&job.tenant_alias, product_alias, environment)
      .with_release(job.product_release_id.clone());

    let Some(configuration) = self.provider.configuration(&release).await? else {
      warn!(release = ?release.product_release_id, "configuration_not_found");
      return Ok(());
    };
    let Some(automation) = configuration.automation(&job.automation_alias) else {
      warn!(release = ?release.product_release_id, "automation_not_found");
      return Ok(());
    };

    automation
      .continue_action(
        &mut data,
        &job.action_alias,
        job.parent_action_data_path.as_deref(),
        cancel,
      )
      .await?;
    info!("async_action_completed");
    Ok(())
  }
}
