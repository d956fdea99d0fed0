use policyflow_config::{
  AutomationsConfigurationModel, ConfigError, ValidationOptions, validate_with,
};

use crate::automation::Automation;
use crate::build::{Build, Dependencies};
use crate::data::AutomationData;
use crate::trigger::{Schedule, Trigger};

/// Every automation of one tenant, product and environment, built and ready
/// to run.
pub struct AutomationsConfiguration {
  automations: Vec<Automation>,
}

impl AutomationsConfiguration {
  /// Validate `model` and build it.
  pub fn build(model: &AutomationsConfigurationModel, deps: &Dependencies) -> Result<Self, ConfigError> {
    Self::build_with(model, deps, ValidationOptions::default())
  }

  pub fn build_with(
    model: &AutomationsConfigurationModel,
    deps: &Dependencies,
    options: ValidationOptions,
  ) -> Result<Self, ConfigError> {
    validate_with(model, options)?;
    Ok(Self {
      automations: model.automations.build(deps)?,
    })
  }

  pub fn automations(&self) -> &[Automation] {
    &self.automations
  }

  pub fn automation(&self, alias: &str) -> Option<&Automation> {
    self
      .automations
      .iter()
      .find(|automation| automation.alias() == alias)
  }

  pub fn matching_automations<'a>(
    &'a self,
    data: &'a AutomationData,
  ) -> impl Iterator<Item = &'a Automation> + 'a {
    self
      .automations
      .iter()
      .filter(move |automation| automation.does_match(data))
  }

  /// The most specific HTTP trigger for the request in `data` across all
  /// automations. Ties go to the automation declared first.
  pub fn best_http_match(&self, data: &AutomationData) -> Option<(&Automation, &Trigger)> {
    let mut best: Option<(&Automation, &Trigger, u32)> = None;
    for automation in &self.automations {
      if let Some((trigger, score)) = automation.best_http_trigger(data)
        && best.is_none_or(|(_, _, best_score)| score > best_score)
      {
        best = Some((automation, trigger, score));
      }
    }
    best.map(|(automation, trigger, _)| (automation, trigger))
  }

  /// Periodic schedules of every automation, with the owning automation.
  pub fn periodic_triggers(&self) -> impl Iterator<Item = (&Automation, Schedule<'_>)> {
    self.automations.iter().flat_map(|automation| {
      automation
        .triggers()
        .iter()
        .filter_map(move |trigger| trigger.schedule().map(|schedule| (automation, schedule)))
    })
  }
}
