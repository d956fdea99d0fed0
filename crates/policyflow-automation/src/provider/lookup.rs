use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use policyflow_config::provider::{ObjectPathLookupModel, ObjectProviderModel, decimal_from_value};
use policyflow_config::{ConfigError, Error};
use policyflow_pointer::{Pointer, Resolution};
use rust_decimal::Decimal;
use serde_json::Value;

use super::temporal::{parse_date, parse_date_time, parse_time};
use super::{BoxProvider, Provider, ProviderContext};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

/// A type a path lookup can read out of JSON.
pub trait LookupValue: Sized + Send + Sync + 'static {
  const KIND: &'static str;

  /// `None` when `value` has the wrong shape.
  fn from_json(value: &Value) -> Option<Self>;
}

impl LookupValue for String {
  const KIND: &'static str = "text";

  fn from_json(value: &Value) -> Option<Self> {
    match value {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      Value::Bool(b) => Some(b.to_string()),
      _ => None,
    }
  }
}

impl LookupValue for i64 {
  const KIND: &'static str = "integer";

  fn from_json(value: &Value) -> Option<Self> {
    match value {
      Value::Number(n) => n
        .as_i64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }
}

impl LookupValue for Decimal {
  const KIND: &'static str = "number";

  fn from_json(value: &Value) -> Option<Self> {
    decimal_from_value(value)
  }
}

impl LookupValue for bool {
  const KIND: &'static str = "condition";

  fn from_json(value: &Value) -> Option<Self> {
    match value {
      Value::Bool(b) => Some(*b),
      Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
      Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
      _ => None,
    }
  }
}

impl LookupValue for NaiveDate {
  const KIND: &'static str = "date";

  fn from_json(value: &Value) -> Option<Self> {
    value.as_str().and_then(parse_date)
  }
}

impl LookupValue for NaiveTime {
  const KIND: &'static str = "time";

  fn from_json(value: &Value) -> Option<Self> {
    value.as_str().and_then(parse_time)
  }
}

impl LookupValue for DateTime<Utc> {
  const KIND: &'static str = "dateTime";

  fn from_json(value: &Value) -> Option<Self> {
    value.as_str().and_then(parse_date_time)
  }
}

impl LookupValue for Value {
  const KIND: &'static str = "object";

  fn from_json(value: &Value) -> Option<Self> {
    Some(value.clone())
  }
}

impl LookupValue for Vec<Value> {
  const KIND: &'static str = "list";

  fn from_json(value: &Value) -> Option<Self> {
    value.as_array().cloned()
  }
}

/// Reads a value from the automation data, or from a supplied object, by
/// object pointer.
pub struct PathLookup<T> {
  pointer: Pointer,
  data_object: Option<BoxProvider<Value>>,
  value_if_not_found: Option<BoxProvider<T>>,
  value_if_null: Option<BoxProvider<T>>,
  raise_error_if_not_found: bool,
  raise_error_if_null: bool,
  raise_error_if_type_mismatch: bool,
}

pub(crate) fn parse_pointer(path: &str, provider_name: &str) -> Result<Pointer, ConfigError> {
  Pointer::parse(path)
    .map(|pointer| pointer.with_provider(provider_name))
    .map_err(|e| ConfigError::InvalidValue {
      field: provider_name.to_string(),
      message: e.to_string(),
    })
}

impl<T: LookupValue> PathLookup<T> {
  pub fn build<M>(
    provider_name: &str,
    model: &ObjectPathLookupModel<M>,
    deps: &Dependencies,
  ) -> Result<Self, ConfigError>
  where
    M: Build<Output = BoxProvider<T>>,
  {
    Ok(Self {
      pointer: parse_pointer(&model.path, provider_name)?,
      data_object: model.data_object.build(deps)?,
      value_if_not_found: model.value_if_not_found.build(deps)?,
      value_if_null: model.value_if_null.build(deps)?,
      raise_error_if_not_found: model.raise_error_if_not_found,
      raise_error_if_null: model.raise_error_if_null,
      raise_error_if_type_mismatch: model.raise_error_if_type_mismatch,
    })
  }

  /// A lookup that never raises and has no fallbacks.
  pub(crate) fn lenient(
    provider_name: &str,
    path: &str,
    data_object: Option<&ObjectProviderModel>,
    deps: &Dependencies,
  ) -> Result<Self, ConfigError> {
    Ok(Self {
      pointer: parse_pointer(path, provider_name)?,
      data_object: data_object.map(|model| model.build(deps)).transpose()?,
      value_if_not_found: None,
      value_if_null: None,
      raise_error_if_not_found: false,
      raise_error_if_null: false,
      raise_error_if_type_mismatch: false,
    })
  }

  async fn lookup(&self, ctx: &ProviderContext<'_>) -> Result<Resolution, EngineError> {
    match &self.data_object {
      Some(object) => {
        let root = object.resolve(ctx).await?.unwrap_or(Value::Null);
        Ok(self.pointer.evaluate(&root, Some(ctx.position()))?)
      }
      None => Ok(ctx.evaluate(&self.pointer)?),
    }
  }

  fn type_mismatch(&self, value: &Value) -> EngineError {
    EngineError::raised(
      Error::new(
        "automation.path.type.mismatch",
        "Unexpected value type",
        format!(
          "the value at '{}' is not a valid {}",
          self.pointer.source(),
          T::KIND
        ),
        400,
      )
      .with_data("pointer", self.pointer.source())
      .with_data("expectedType", T::KIND)
      .with_data("value", value.clone()),
    )
  }
}

#[async_trait]
impl<T: LookupValue> Provider<T> for PathLookup<T> {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<T>, EngineError> {
    match self.lookup(ctx).await? {
      Resolution::Missing(failure) => {
        if let Some(fallback) = &self.value_if_not_found {
          return fallback.resolve(ctx).await;
        }
        if self.raise_error_if_not_found {
          return Err(EngineError::path_not_found(&failure));
        }
        Ok(None)
      }
      Resolution::Found(Value::Null) => {
        if let Some(fallback) = &self.value_if_null {
          return fallback.resolve(ctx).await;
        }
        if self.raise_error_if_null {
          return Err(EngineError::raised(
            Error::new(
              "automation.path.value.null",
              "Value is null",
              format!("the value at '{}' is null", self.pointer.source()),
              400,
            )
            .with_data("pointer", self.pointer.source()),
          ));
        }
        Ok(None)
      }
      Resolution::Found(value) => match T::from_json(&value) {
        Some(typed) => Ok(Some(typed)),
        None if self.raise_error_if_type_mismatch => Err(self.type_mismatch(&value)),
        None => Ok(None),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use policyflow_config::provider::{IntegerProviderModel, TextProviderModel};
  use serde_json::json;
  use tokio_util::sync::CancellationToken;

  use super::super::testing;
  use super::*;

  async fn text(model: serde_json::Value) -> Result<Option<String>, EngineError> {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let provider = testing::build::<TextProviderModel>(model);
    provider.resolve(&ProviderContext::new(&data, &cancel)).await
  }

  #[tokio::test]
  async fn test_found_value() {
    let value = text(json!({"objectPathLookupText": "/context/quote/quoteNumber"}))
      .await
      .unwrap();
    assert_eq!(value.as_deref(), Some("Q-0001"));
  }

  #[tokio::test]
  async fn test_missing_raises_by_default() {
    let error = text(json!({"objectPathLookupText": "/context/quote/nope"}))
      .await
      .unwrap_err()
      .to_error();
    assert_eq!(error.code, "automation.path.not.found");
    assert_eq!(error.data["providerName"], json!("objectPathLookupText"));
  }

  #[tokio::test]
  async fn test_missing_uses_fallback() {
    let value = text(json!({"objectPathLookupText": {
      "path": "/context/quote/nope",
      "valueIfNotFound": "fallback"
    }}))
    .await
    .unwrap();
    assert_eq!(value.as_deref(), Some("fallback"));
  }

  #[tokio::test]
  async fn test_null_without_fallback_is_absent() {
    let value = text(json!({"objectPathLookupText": "/context/quote/customer"}))
      .await
      .unwrap();
    assert_eq!(value, None);
  }

  #[tokio::test]
  async fn test_wrong_shape_is_hard_error() {
    let result = text(json!({"objectPathLookupText": "/context/quote/quoteNumber/first"})).await;
    assert!(matches!(result, Err(EngineError::Pointer(_))));
  }

  #[tokio::test]
  async fn test_type_mismatch() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&data, &cancel);
    let strict = testing::build::<IntegerProviderModel>(
      json!({"objectPathLookupInteger": "/context/quote/quoteNumber"}),
    );
    let error = strict.resolve(&ctx).await.unwrap_err().to_error();
    assert_eq!(error.code, "automation.path.type.mismatch");

    let lenient = testing::build::<IntegerProviderModel>(json!({"objectPathLookupInteger": {
      "path": "/context/quote/quoteNumber",
      "raiseErrorIfTypeMismatch": false
    }}));
    assert_eq!(lenient.resolve(&ctx).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_data_object_override() {
    let value = text(json!({"objectPathLookupText": {
      "path": "/name",
      "dataObject": {"staticObject": {"name": "Ann"}}
    }}))
    .await
    .unwrap();
    assert_eq!(value.as_deref(), Some("Ann"));
  }
}
