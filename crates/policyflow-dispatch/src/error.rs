//! Dispatch errors.

use policyflow_automation::EngineError;
use policyflow_config::{ConfigError, Error};
use policyflow_jobs::JobError;

/// Errors that can occur while loading configurations or dispatching runs.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
  /// An IO error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// `settings.json` could not be parsed.
  #[error("invalid settings: {0}")]
  Settings(#[source] serde_json::Error),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error(transparent)]
  Job(#[from] JobError),

  /// Neither the event nor the fallback table names a product.
  #[error("no product could be resolved for tenant '{tenant_alias}'")]
  ProductNotResolved { tenant_alias: String },
}

impl DispatchError {
  /// The structured form of this error, as rendered to API callers.
  pub fn to_error(&self) -> Error {
    match self {
      Self::Config(error) => error.to_error(),
      Self::Engine(error) => error.to_error(),
      Self::ProductNotResolved { tenant_alias } => Error::new(
        "automation.product.not.resolved",
        "Product not resolved",
        self.to_string(),
        400,
      )
      .with_data("tenantAlias", tenant_alias.clone()),
      Self::Io(_) | Self::Settings(_) | Self::Job(_) => Error::new(
        "automation.dispatch.failed",
        "Automation dispatch failed",
        self.to_string(),
        500,
      ),
    }
  }
}
