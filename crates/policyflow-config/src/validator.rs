use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::action::ActionModel;
use crate::configuration::{AutomationModel, AutomationsConfigurationModel};
use crate::error::ConfigError;
use crate::trigger::TriggerModel;

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOptions {
  /// Also reject identical HTTP routes declared by different automations.
  /// Off by default: across automations the best-scoring trigger wins at
  /// request time.
  pub cross_automation_routes: bool,
}

/// Check a deserialized configuration, stopping at the first violation.
///
/// Order: automation aliases, then per automation its trigger aliases,
/// action aliases (whole tree including on-error handlers) and HTTP routes.
pub fn validate(config: &AutomationsConfigurationModel) -> Result<(), ConfigError> {
  validate_with(config, ValidationOptions::default())
}

pub fn validate_with(
  config: &AutomationsConfigurationModel,
  options: ValidationOptions,
) -> Result<(), ConfigError> {
  let mut automation_aliases = HashSet::new();
  for automation in &config.automations {
    if !automation_aliases.insert(automation.alias.as_str()) {
      return Err(ConfigError::DuplicateAutomationAlias {
        alias: automation.alias.clone(),
      });
    }
  }

  for automation in &config.automations {
    validate_trigger_aliases(automation)?;
    validate_action_aliases(automation)?;
    validate_routes(automation)?;
  }

  if options.cross_automation_routes {
    validate_cross_automation_routes(config)?;
  }

  debug!(
    automations = config.automations.len(),
    "configuration_validated"
  );
  Ok(())
}

fn validate_trigger_aliases(automation: &AutomationModel) -> Result<(), ConfigError> {
  let mut seen = HashSet::new();
  for trigger in &automation.triggers {
    if !seen.insert(trigger.alias()) {
      return Err(ConfigError::DuplicateTriggerAlias {
        automation_alias: automation.alias.clone(),
        alias: trigger.alias().to_string(),
      });
    }
  }
  Ok(())
}

fn validate_action_aliases(automation: &AutomationModel) -> Result<(), ConfigError> {
  let mut seen = HashSet::new();
  collect_action_aliases(&automation.actions, &mut seen).map_err(|alias| {
    ConfigError::DuplicateActionAlias {
      automation_alias: automation.alias.clone(),
      alias,
    }
  })
}

fn collect_action_aliases<'a>(
  actions: &'a [ActionModel],
  seen: &mut HashSet<&'a str>,
) -> Result<(), String> {
  for action in actions {
    if !seen.insert(action.alias()) {
      return Err(action.alias().to_string());
    }
    if let Some(children) = action.child_actions() {
      collect_action_aliases(children, seen)?;
    }
    collect_action_aliases(action.on_error_actions(), seen)?;
  }
  Ok(())
}

fn http_routes(automation: &AutomationModel) -> impl Iterator<Item = (&str, String, String)> {
  automation.triggers.iter().filter_map(|trigger| match trigger {
    TriggerModel::Http(http) => Some((
      http.common.alias.as_str(),
      http.endpoint.http_verb.to_ascii_uppercase(),
      http.endpoint.route_shape(),
    )),
    _ => None,
  })
}

fn validate_routes(automation: &AutomationModel) -> Result<(), ConfigError> {
  let mut seen: HashMap<(String, String), &str> = HashMap::new();
  for (alias, verb, shape) in http_routes(automation) {
    if let Some(first) = seen.get(&(verb.clone(), shape.clone())) {
      return Err(ConfigError::HttpRouteCollision {
        automation_alias: automation.alias.clone(),
        first_trigger: first.to_string(),
        second_trigger: alias.to_string(),
        verb,
        path: shape,
      });
    }
    seen.insert((verb, shape), alias);
  }
  Ok(())
}

fn validate_cross_automation_routes(
  config: &AutomationsConfigurationModel,
) -> Result<(), ConfigError> {
  let mut seen: HashMap<(String, String), (&str, &str)> = HashMap::new();
  for automation in &config.automations {
    for (alias, verb, shape) in http_routes(automation) {
      let key = (verb, shape);
      match seen.get(&key) {
        Some((owner, first)) if *owner != automation.alias => {
          return Err(ConfigError::HttpRouteCollision {
            automation_alias: automation.alias.clone(),
            first_trigger: format!("{owner}.{first}"),
            second_trigger: format!("{}.{}", automation.alias, alias),
            verb: key.0,
            path: key.1,
          });
        }
        Some(_) => {}
        None => {
          seen.insert(key, (automation.alias.as_str(), alias));
        }
      }
    }
  }
  Ok(())
}
