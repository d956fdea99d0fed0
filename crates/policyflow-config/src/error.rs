use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The uniform, machine-readable error value.
///
/// Configuration failures, raised errors and failed actions all surface as
/// one of these so API layers can render a consistent payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
  pub code: String,
  pub title: String,
  pub message: String,
  #[serde(default = "default_status")]
  pub http_status_code: u16,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub additional_details: Vec<String>,
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub data: Map<String, Value>,
}

fn default_status() -> u16 {
  400
}

impl Error {
  pub fn new(
    code: impl Into<String>,
    title: impl Into<String>,
    message: impl Into<String>,
    http_status_code: u16,
  ) -> Self {
    Self {
      code: code.into(),
      title: title.into(),
      message: message.into(),
      http_status_code,
      additional_details: Vec::new(),
      data: Map::new(),
    }
  }

  pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.data.insert(key.into(), value.into());
    self
  }

  /// Add a data entry unless one already exists under the same key.
  pub fn enrich(&mut self, key: &str, value: impl Into<Value>) {
    if !self.data.contains_key(key) {
      self.data.insert(key.to_string(), value.into());
    }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({}): {}", self.title, self.code, self.message)
  }
}

/// Errors found while loading or validating an automation configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
  /// A fragment could not be deserialized, typically because its
  /// discriminator key is not registered.
  #[error("invalid automation configuration: {message}")]
  InvalidConfiguration {
    message: String,
    category: Option<String>,
    key: Option<String>,
    fragment: Option<Value>,
  },

  #[error("duplicate automation alias '{alias}'")]
  DuplicateAutomationAlias { alias: String },

  #[error("duplicate trigger alias '{alias}' in automation '{automation_alias}'")]
  DuplicateTriggerAlias {
    automation_alias: String,
    alias: String,
  },

  #[error("duplicate action alias '{alias}' in automation '{automation_alias}'")]
  DuplicateActionAlias {
    automation_alias: String,
    alias: String,
  },

  #[error(
    "http triggers '{first_trigger}' and '{second_trigger}' in automation '{automation_alias}' both handle {verb} {path}"
  )]
  HttpRouteCollision {
    automation_alias: String,
    first_trigger: String,
    second_trigger: String,
    verb: String,
    path: String,
  },

  #[error("automation '{alias}' not found")]
  AutomationNotFound { alias: String },

  #[error("action '{alias}' not found in automation '{automation_alias}'")]
  ActionNotFound {
    automation_alias: String,
    alias: String,
  },

  /// A configured value is present but unusable (bad pointer, bad date).
  #[error("invalid value for '{field}': {message}")]
  InvalidValue { field: String, message: String },
}

impl ConfigError {
  pub fn code(&self) -> &'static str {
    match self {
      Self::InvalidConfiguration { .. } => "automation.configuration.invalid",
      Self::DuplicateAutomationAlias { .. } => "automation.configuration.duplicate.automation.alias",
      Self::DuplicateTriggerAlias { .. } => "automation.configuration.duplicate.trigger.alias",
      Self::DuplicateActionAlias { .. } => "automation.configuration.duplicate.action.alias",
      Self::HttpRouteCollision { .. } => "automation.configuration.http.route.collision",
      Self::AutomationNotFound { .. } => "automation.not.found",
      Self::ActionNotFound { .. } => "automation.action.not.found",
      Self::InvalidValue { .. } => "automation.configuration.invalid.value",
    }
  }

  /// Convert into the structured error, keeping every field as data.
  pub fn to_error(&self) -> Error {
    let status = match self {
      Self::AutomationNotFound { .. } | Self::ActionNotFound { .. } => 404,
      _ => 400,
    };
    let error = Error::new(
      self.code(),
      "Invalid automation configuration",
      self.to_string(),
      status,
    );
    match self {
      Self::InvalidConfiguration {
        category,
        key,
        fragment,
        ..
      } => error
        .with_data("category", category.clone())
        .with_data("key", key.clone())
        .with_data("fragment", fragment.clone()),
      Self::DuplicateAutomationAlias { alias } => error.with_data("alias", alias.clone()),
      Self::DuplicateTriggerAlias {
        automation_alias,
        alias,
      }
      | Self::DuplicateActionAlias {
        automation_alias,
        alias,
      }
      | Self::ActionNotFound {
        automation_alias,
        alias,
      } => error
        .with_data("automationAlias", automation_alias.clone())
        .with_data("alias", alias.clone()),
      Self::HttpRouteCollision {
        automation_alias,
        first_trigger,
        second_trigger,
        verb,
        path,
      } => error
        .with_data("automationAlias", automation_alias.clone())
        .with_data("firstTrigger", first_trigger.clone())
        .with_data("secondTrigger", second_trigger.clone())
        .with_data("httpVerb", verb.clone())
        .with_data("path", path.clone()),
      Self::AutomationNotFound { alias } => error.with_data("automationAlias", alias.clone()),
      Self::InvalidValue { field, .. } => error.with_data("field", field.clone()),
    }
  }
}
