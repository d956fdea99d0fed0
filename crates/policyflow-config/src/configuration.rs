use serde::Deserialize;
use serde_json::Value;

use crate::action::ActionModel;
use crate::error::ConfigError;
use crate::provider::ConditionProviderModel;
use crate::registry;
use crate::trigger::TriggerModel;

/// The top-level `automations.json` document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationsConfigurationModel {
  #[serde(default)]
  pub schema_version: Option<String>,
  #[serde(default)]
  pub automations: Vec<AutomationModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationModel {
  pub name: String,
  pub alias: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub run_condition: Option<ConditionProviderModel>,
  #[serde(default)]
  pub triggers: Vec<TriggerModel>,
  #[serde(default)]
  pub actions: Vec<ActionModel>,
}

impl AutomationsConfigurationModel {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    registry::clear_failure();
    let result = serde_json::from_str(json);
    result.map_err(invalid_configuration)
  }

  pub fn from_value(value: Value) -> Result<Self, ConfigError> {
    registry::clear_failure();
    let result = serde_json::from_value(value);
    result.map_err(invalid_configuration)
  }

  pub fn automation(&self, alias: &str) -> Option<&AutomationModel> {
    self.automations.iter().find(|a| a.alias == alias)
  }
}

fn invalid_configuration(err: serde_json::Error) -> ConfigError {
  match registry::take_failure() {
    Some(failure) => ConfigError::InvalidConfiguration {
      message: err.to_string(),
      category: Some(failure.category.to_string()),
      key: failure.key,
      fragment: Some(failure.fragment),
    },
    None => ConfigError::InvalidConfiguration {
      message: err.to_string(),
      category: None,
      key: None,
      fragment: None,
    },
  }
}
