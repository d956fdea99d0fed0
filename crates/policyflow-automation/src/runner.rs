//! Runs one action node against the automation data.
//!
//! Failures an action is responsible for are recorded on its
//! [`ActionData`](crate::data::ActionData) and do not abort the caller; only
//! cancellation, queue, serialization and drift errors propagate.

use std::sync::Arc;

use futures::future::BoxFuture;
use minijinja::{Environment, context};
use policyflow_jobs::{AsyncActionJob, Job, JobPayload, JobQueue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::action::{Action, ActionKind, Iterate};
use crate::data::{ActionDetails, AutomationData, IterationData};
use crate::error::EngineError;
use crate::path::{ActionPath, Via};
use crate::provider::{ProviderContext, resolve_optional};

const DISPLAY_NAME: &str =
  "{{ tenant }}/{{ organisation }}/{{ product }}/{{ environment }}: {{ automation }}.{{ action }}";

pub struct ActionRunner {
  jobs: Arc<dyn JobQueue>,
  queue: String,
}

impl ActionRunner {
  pub fn new(jobs: Arc<dyn JobQueue>, queue: impl Into<String>) -> Self {
    Self {
      jobs,
      queue: queue.into(),
    }
  }

  /// Queue that asynchronous actions are handed to.
  pub fn queue(&self) -> &str {
    &self.queue
  }

  /// Run `action`, whose record lives at `path` inside `data`.
  ///
  /// Asynchronous actions are enqueued instead of run unless `is_internal`
  /// is set, which is how the continuation re-enters for the queued action.
  pub fn handle_action<'a>(
    &'a self,
    data: &'a mut AutomationData,
    action: &'a Action,
    path: &'a ActionPath,
    cancel: &'a CancellationToken,
    is_internal: bool,
  ) -> BoxFuture<'a, Result<(), EngineError>> {
    Box::pin(self.run_action(data, action, path, cancel, is_internal))
  }

  #[instrument(
    name = "action_run",
    skip(self, data, action, cancel),
    fields(action_alias = %action.alias, path = %path)
  )]
  async fn run_action(
    &self,
    data: &mut AutomationData,
    action: &Action,
    path: &ActionPath,
    cancel: &CancellationToken,
    is_internal: bool,
  ) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }
    data.ensure_action_data(path, || action.new_data())?;

    if action.asynchronous && !is_internal {
      return self.enqueue(data, action, path).await;
    }

    let condition = {
      let ctx = ProviderContext::new(data, cancel).at(path.to_pointer());
      resolve_optional(&action.run_condition, &ctx).await
    };
    let result = match condition {
      Ok(Some(false)) => {
        data.require_action_data(path)?.skip();
        debug!("action_skipped");
        return Ok(());
      }
      Ok(_) => {
        data.require_action_data(path)?.start();
        self.execute(data, action, path, cancel).await
      }
      Err(err) => Err(err),
    };

    if let Err(err) = result {
      if !err.is_recordable() {
        return Err(err);
      }
      warn!(error = %err, "action_failed");
      data.require_action_data(path)?.fail(err.to_error());
    }
    if data.action_data(path).is_some_and(|record| record.error.is_some()) {
      self.run_on_error_actions(data, action, path, cancel).await?;
    }

    let record = data.require_action_data(path)?;
    record.finish();
    info!(status = ?record.status, "action_finished");
    Ok(())
  }

  async fn enqueue(
    &self,
    data: &mut AutomationData,
    action: &Action,
    path: &ActionPath,
  ) -> Result<(), EngineError> {
    data.require_action_data(path)?.toggle_status_for_async();

    let automation = &data.automation;
    let automation_alias = automation.automation_alias.clone().unwrap_or_default();
    let env = Environment::new();
    let display_name = env.render_str(
      DISPLAY_NAME,
      context! {
        tenant => &automation.tenant_alias,
        organisation => automation.organisation_alias.as_deref().unwrap_or("-"),
        product => automation.product_alias.as_deref().unwrap_or("-"),
        environment => &automation.environment,
        automation => &automation_alias,
        action => &action.alias,
      },
    )?;
    let job = AsyncActionJob {
      automation_data_json: data.to_json()?,
      automation_alias,
      action_alias: action.alias.clone(),
      tenant_alias: automation.tenant_alias.clone(),
      organisation_alias: automation.organisation_alias.clone(),
      product_alias: automation.product_alias.clone(),
      environment: Some(automation.environment.clone()),
      product_release_id: automation.product_release_id.clone(),
      is_internal: true,
      parent_action_data_path: path.parent().map(|parent| parent.to_string()),
    };
    let job_id = self
      .jobs
      .enqueue(Job {
        queue: self.queue.clone(),
        display_name,
        payload: JobPayload::AutomationAction(job),
      })
      .await?;
    info!(job_id = %job_id, queue = %self.queue, "action_enqueued");
    Ok(())
  }

  async fn execute(
    &self,
    data: &mut AutomationData,
    action: &Action,
    path: &ActionPath,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    match &action.kind {
      ActionKind::Leaf(leaf) => {
        let mut details = data.require_action_data(path)?.details.clone();
        let result = {
          let ctx = ProviderContext::new(data, cancel).at(path.to_pointer());
          leaf.perform(&ctx, &mut details).await
        };
        data.require_action_data(path)?.details = details;
        result
      }
      ActionKind::Group(children) => {
        self
          .run_children(data, children, path, Via::Child, cancel)
          .await
      }
      ActionKind::Iterate(iterate) => self.iterate(data, iterate, path, cancel).await,
    }
  }

  /// Run children in order; the first child error stops the run and is
  /// returned as the parent's own failure.
  async fn run_children(
    &self,
    data: &mut AutomationData,
    children: &[Action],
    parent: &ActionPath,
    via: Via,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    for child in children {
      let child_path = parent.child(&child.alias, via);
      self
        .handle_action(data, child, &child_path, cancel, false)
        .await?;
      if let Some(error) = data
        .action_data(&child_path)
        .and_then(|record| record.error.clone())
      {
        return Err(EngineError::raised(error));
      }
    }
    Ok(())
  }

  /// Items are reversed first, then `startIndex` items are skipped and at
  /// most `maxIterations` run. The per-item condition sees the item as the
  /// current iteration.
  async fn iterate(
    &self,
    data: &mut AutomationData,
    iterate: &Iterate,
    path: &ActionPath,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    let (items, start_index, max_iterations) = {
      let ctx = ProviderContext::new(data, cancel).at(path.to_pointer());
      (
        iterate.list.resolve(&ctx).await?.unwrap_or_default(),
        resolve_optional(&iterate.start_index, &ctx).await?,
        resolve_optional(&iterate.max_iterations, &ctx).await?,
      )
    };
    let start_index = non_negative(start_index.unwrap_or(0), "startIndex")?;
    let max_iterations = match max_iterations {
      Some(max) => non_negative(max, "maxIterations")?,
      None => usize::MAX,
    };

    let mut indexed: Vec<(usize, _)> = items.into_iter().enumerate().collect();
    if iterate.reverse {
      indexed.reverse();
    }
    let mut completed = 0;
    for (index, item) in indexed.into_iter().skip(start_index).take(max_iterations) {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }
      *iteration_state(data, path)?.0 = Some(IterationData::new(index as i64, item));

      let included = {
        let ctx = ProviderContext::new(data, cancel).at(path.to_pointer());
        resolve_optional(&iterate.condition, &ctx).await?
      };
      if included == Some(false) {
        debug!(index, "iteration_skipped");
        continue;
      }

      let result = self
        .run_children(data, &iterate.actions, path, Via::Iteration, cancel)
        .await;
      completed += 1;
      *iteration_state(data, path)?.1 = completed;
      result?;
    }
    Ok(())
  }

  async fn run_on_error_actions(
    &self,
    data: &mut AutomationData,
    action: &Action,
    path: &ActionPath,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    for handler in &action.on_error_actions {
      let handler_path = path.child(&handler.alias, Via::OnError);
      self
        .handle_action(data, handler, &handler_path, cancel, false)
        .await?;
      if data
        .action_data(&handler_path)
        .is_some_and(|record| record.error.is_some())
      {
        break;
      }
    }
    Ok(())
  }
}

fn non_negative(value: i64, field: &str) -> Result<usize, EngineError> {
  usize::try_from(value).map_err(|_| {
    EngineError::invalid_value("iterateAction", format!("{} must not be negative", field))
  })
}

fn iteration_state<'a>(
  data: &'a mut AutomationData,
  path: &ActionPath,
) -> Result<(&'a mut Option<IterationData>, &'a mut i64), EngineError> {
  match &mut data.require_action_data(path)?.details {
    ActionDetails::Iterate {
      current_iteration,
      iterations_completed,
    } => Ok((current_iteration, iterations_completed)),
    _ => Err(EngineError::ActionDataNotFound {
      path: path.to_string(),
    }),
  }
}
