use std::sync::Arc;

use policyflow_config::{AutomationModel, ConfigError};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::action::{Action, find_action};
use crate::build::{Build, Dependencies};
use crate::data::AutomationData;
use crate::error::EngineError;
use crate::path::ActionPath;
use crate::provider::{BoxProvider, ProviderContext, resolve_optional};
use crate::runner::ActionRunner;
use crate::trigger::Trigger;

/// A runnable automation: triggers that start it and the actions it runs.
pub struct Automation {
  alias: String,
  name: String,
  description: Option<String>,
  run_condition: Option<BoxProvider<bool>>,
  triggers: Vec<Trigger>,
  actions: Vec<Action>,
  runner: Arc<ActionRunner>,
}

impl Build for AutomationModel {
  type Output = Automation;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(Automation {
      alias: self.alias.clone(),
      name: self.name.clone(),
      description: self.description.clone(),
      run_condition: self.run_condition.build(deps)?,
      triggers: self.triggers.build(deps)?,
      actions: self.actions.build(deps)?,
      runner: deps.runner.clone(),
    })
  }
}

impl Automation {
  pub fn alias(&self) -> &str {
    &self.alias
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn triggers(&self) -> &[Trigger] {
    &self.triggers
  }

  pub fn actions(&self) -> &[Action] {
    &self.actions
  }

  pub fn trigger(&self, alias: &str) -> Option<&Trigger> {
    self.triggers.iter().find(|trigger| trigger.alias() == alias)
  }

  /// First trigger, in declaration order, that handles `data`.
  pub fn matching_trigger(&self, data: &AutomationData) -> Option<&Trigger> {
    self.triggers.iter().find(|trigger| trigger.does_match(data))
  }

  pub fn does_match(&self, data: &AutomationData) -> bool {
    self.matching_trigger(data).is_some()
  }

  /// Best-scoring HTTP trigger of this automation for the request in `data`.
  pub fn best_http_trigger(&self, data: &AutomationData) -> Option<(&Trigger, u32)> {
    self
      .triggers
      .iter()
      .filter(|trigger| trigger.is_http())
      .filter_map(|trigger| trigger.match_score(data).map(|score| (trigger, score)))
      .max_by_key(|(_, score)| *score)
  }

  /// Run the automation against `data`.
  ///
  /// With `trigger` unset the first matching trigger is used; no match, a
  /// false trigger condition or a false automation condition end the run
  /// quietly. When any action ends with an error the latest such error,
  /// enriched with run context, becomes the automation error and is
  /// returned. Otherwise the trigger writes its completion response.
  #[instrument(
    name = "automation_execute",
    skip(self, data, trigger, cancel),
    fields(automation_alias = %self.alias, tenant = %data.automation.tenant_alias)
  )]
  pub async fn execute(
    &self,
    data: &mut AutomationData,
    trigger: Option<&Trigger>,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }
    let Some(trigger) = trigger.or_else(|| self.matching_trigger(data)) else {
      info!("automation_not_triggered");
      return Ok(());
    };
    data.automation.automation_alias = Some(self.alias.clone());
    data.automation.trigger_alias = Some(trigger.alias().to_string());
    trigger.bind_path_parameters(data);

    let (trigger_holds, automation_holds) = {
      let ctx = ProviderContext::new(data, cancel);
      let trigger_holds = trigger.condition_holds(&ctx).await?;
      let automation_holds = trigger_holds
        && resolve_optional(&self.run_condition, &ctx)
          .await?
          .unwrap_or(true);
      (trigger_holds, automation_holds)
    };
    if !trigger_holds || !automation_holds {
      info!(
        trigger_alias = %trigger.alias(),
        trigger_holds,
        "automation_conditions_not_met"
      );
      return Ok(());
    }

    info!(trigger_alias = %trigger.alias(), "automation_started");
    for action in &self.actions {
      let path = ActionPath::top(&action.alias);
      self
        .runner
        .handle_action(data, action, &path, cancel, false)
        .await?;
      if data
        .action_data(&path)
        .is_some_and(|record| record.error.is_some())
      {
        break;
      }
    }

    if let Some(mut error) = data.latest_action_error().cloned() {
      if let Some(quote_id) = data.quote_id() {
        error.enrich("quoteId", quote_id);
      }
      error.enrich("automationAlias", self.alias.clone());
      error.enrich("triggerAlias", trigger.alias());
      warn!(code = %error.code, "automation_failed");
      data.error = Some(error.clone());
      return Err(EngineError::raised(error));
    }

    trigger.generate_completion_response(data, cancel).await?;
    info!("automation_completed");
    Ok(())
  }

  /// Re-enter the runner for one queued action.
  ///
  /// `parent_path` is the parent record path the job was enqueued with; it
  /// is only cross-checked against the path found in the action tree.
  #[instrument(
    name = "automation_continue",
    skip(self, data, parent_path, cancel),
    fields(automation_alias = %self.alias)
  )]
  pub async fn continue_action(
    &self,
    data: &mut AutomationData,
    action_alias: &str,
    parent_path: Option<&str>,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    let Some((action, path)) = find_action(&self.actions, action_alias) else {
      return Err(
        ConfigError::ActionNotFound {
          automation_alias: self.alias.clone(),
          alias: action_alias.to_string(),
        }
        .into(),
      );
    };
    let expected_parent = path.parent().map(|parent| parent.to_string());
    if parent_path.is_some() && parent_path != expected_parent.as_deref() {
      warn!(
        recorded = ?parent_path,
        found = ?expected_parent,
        "action_parent_path_mismatch"
      );
    }

    self
      .runner
      .handle_action(data, action, &path, cancel, true)
      .await?;
    match data.action_data(&path).and_then(|record| record.error.clone()) {
      Some(error) => Err(EngineError::raised(error)),
      None => Ok(()),
    }
  }
}
