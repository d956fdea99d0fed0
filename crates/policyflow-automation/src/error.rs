//! Engine errors.

use policyflow_config::{ConfigError, Error};
use policyflow_jobs::JobError;
use policyflow_pointer::{PathFailure, PointerError};

/// Errors that can occur while building or running automations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// A structured error raised by an action, a provider or a collaborator.
  #[error("{0}")]
  Raised(Box<Error>),

  /// A pointer walked into the wrong shape of data.
  #[error(transparent)]
  Pointer(#[from] PointerError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Job(#[from] JobError),

  /// Automation data could not cross the job queue boundary.
  #[error("automation data serialization failed: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("template rendering failed: {0}")]
  Template(#[from] minijinja::Error),

  /// A nested action's parent data is missing: the parent never ran, or
  /// its iteration context was cleared after the child was queued.
  #[error("action data not found at '{path}'")]
  ActionDataNotFound { path: String },

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}

impl EngineError {
  pub fn raised(error: Error) -> Self {
    Self::Raised(Box::new(error))
  }

  /// A missing path turned into an error because the lookup demanded a value.
  pub(crate) fn path_not_found(failure: &PathFailure) -> Self {
    let mut error = Error::new(
      failure.code(),
      "Path not found",
      failure.to_string(),
      400,
    );
    if let serde_json::Value::Object(context) = failure.context.to_json() {
      error.data.extend(context);
    }
    Self::raised(error)
  }

  pub(crate) fn missing_value(field: &str) -> Self {
    Self::raised(
      Error::new(
        "automation.provider.value.missing",
        "Value missing",
        format!("no value resolved for '{}'", field),
        400,
      )
      .with_data("field", field),
    )
  }

  pub(crate) fn invalid_value(provider: &str, message: impl Into<String>) -> Self {
    Self::raised(
      Error::new(
        "automation.provider.invalid.value",
        "Invalid value",
        message,
        400,
      )
      .with_data("providerName", provider),
    )
  }

  /// Whether the failure belongs on the failing action's data rather than
  /// aborting the caller.
  pub fn is_recordable(&self) -> bool {
    matches!(
      self,
      Self::Raised(_) | Self::Pointer(_) | Self::Config(_) | Self::Template(_)
    )
  }

  /// The structured form of this error.
  pub fn to_error(&self) -> Error {
    match self {
      Self::Raised(error) => (**error).clone(),
      Self::Config(error) => error.to_error(),
      Self::Pointer(error) => {
        let mut structured = Error::new(error.code(), "Invalid path", error.to_string(), 400);
        if let Some(context) = error.context()
          && let serde_json::Value::Object(map) = context.to_json()
        {
          structured.data.extend(map);
        }
        structured
      }
      Self::ActionDataNotFound { path } => Error::new(
        "automation.action.data.not.found",
        "Action data not found",
        self.to_string(),
        500,
      )
      .with_data("path", path.clone()),
      Self::Cancelled => Error::new(
        "automation.cancelled",
        "Automation cancelled",
        self.to_string(),
        499,
      ),
      Self::Job(_) | Self::Serialization(_) | Self::Template(_) => Error::new(
        "automation.execution.failed",
        "Automation execution failed",
        self.to_string(),
        500,
      ),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use policyflow_pointer::{Navigable, Pointer, Resolution};
  use serde_json::json;

  #[test]
  fn test_path_not_found_keeps_context() {
    let root = json!({"quote": {}});
    let pointer = Pointer::parse("/quote/number")
      .unwrap()
      .with_provider("objectPathLookupText");
    let Resolution::Missing(failure) = pointer.evaluate(&root as &dyn Navigable, None).unwrap()
    else {
      panic!("expected missing");
    };
    let error = EngineError::path_not_found(&failure).to_error();
    assert_eq!(error.code, "automation.path.not.found");
    assert_eq!(error.data["pathPrefix"], json!("/quote"));
    assert_eq!(error.data["token"], json!("number"));
    assert_eq!(error.data["providerName"], json!("objectPathLookupText"));
  }

  #[test]
  fn test_recordable_split() {
    assert!(EngineError::raised(Error::new("x", "x", "x", 400)).is_recordable());
    assert!(!EngineError::Cancelled.is_recordable());
    assert!(!EngineError::ActionDataNotFound { path: "/actions/a".into() }.is_recordable());
  }
}
