use std::sync::Arc;

use async_trait::async_trait;
use policyflow_config::action::{ErrorProviderModel, RaiseErrorActionModel, RaiseEventActionModel};
use policyflow_config::{ConfigError, Error};
use serde_json::Value;

use super::Perform;
use crate::build::{Build, Dependencies};
use crate::data::ActionDetails;
use crate::error::EngineError;
use crate::provider::{BoxProvider, ProviderContext, resolve_optional};
use crate::services::{CustomEvent, EventPublisher};

pub struct RaiseEvent {
  custom_event_alias: BoxProvider<String>,
  event_data: Option<BoxProvider<Value>>,
  event_tags: Vec<BoxProvider<String>>,
  publisher: Arc<dyn EventPublisher>,
}

impl Build for RaiseEventActionModel {
  type Output = RaiseEvent;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(RaiseEvent {
      custom_event_alias: self.custom_event_alias.build(deps)?,
      event_data: self.event_data.build(deps)?,
      event_tags: self.event_tags.build(deps)?,
      publisher: deps.events.clone(),
    })
  }
}

#[async_trait]
impl Perform for RaiseEvent {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::RaiseEvent {
      custom_event_alias: None,
      event_id: None,
    }
  }

  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let custom_event_alias = self
      .custom_event_alias
      .require(ctx, "customEventAlias")
      .await?;
    let mut event_tags = Vec::with_capacity(self.event_tags.len());
    for tag in &self.event_tags {
      event_tags.extend(tag.resolve(ctx).await?);
    }
    let automation = &ctx.data().automation;
    let event = CustomEvent {
      tenant_alias: automation.tenant_alias.clone(),
      product_alias: automation.product_alias.clone(),
      environment: automation.environment.clone(),
      custom_event_alias: custom_event_alias.clone(),
      event_data: resolve_optional(&self.event_data, ctx).await?,
      event_tags,
    };
    *details = ActionDetails::RaiseEvent {
      custom_event_alias: Some(custom_event_alias.clone()),
      event_id: None,
    };
    let event_id = self
      .publisher
      .publish(&event)
      .await
      .map_err(EngineError::raised)?;
    *details = ActionDetails::RaiseEvent {
      custom_event_alias: Some(custom_event_alias),
      event_id: Some(event_id),
    };
    Ok(())
  }
}

/// Fails on purpose with a configured error.
pub struct RaiseError {
  code: BoxProvider<String>,
  title: BoxProvider<String>,
  message: BoxProvider<String>,
  http_status_code: Option<BoxProvider<i64>>,
  additional_details: Vec<BoxProvider<String>>,
  data: Option<BoxProvider<Value>>,
}

impl Build for RaiseErrorActionModel {
  type Output = RaiseError;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    let ErrorProviderModel {
      code,
      title,
      message,
      http_status_code,
      additional_details,
      data,
    } = &self.error;
    Ok(RaiseError {
      code: code.build(deps)?,
      title: title.build(deps)?,
      message: message.build(deps)?,
      http_status_code: http_status_code.build(deps)?,
      additional_details: additional_details.build(deps)?,
      data: data.build(deps)?,
    })
  }
}

impl RaiseError {
  async fn error(&self, ctx: &ProviderContext<'_>) -> Result<Error, EngineError> {
    let status = match resolve_optional(&self.http_status_code, ctx).await? {
      Some(status) => u16::try_from(status)
        .ok()
        .filter(|status| (400..=599).contains(status))
        .ok_or_else(|| {
          EngineError::invalid_value("httpStatusCode", format!("{} is not an error status", status))
        })?,
      None => 400,
    };
    let mut error = Error::new(
      self.code.require(ctx, "code").await?,
      self.title.require(ctx, "title").await?,
      self.message.require(ctx, "message").await?,
      status,
    );
    for detail in &self.additional_details {
      error.additional_details.extend(detail.resolve(ctx).await?);
    }
    match resolve_optional(&self.data, ctx).await? {
      Some(Value::Object(data)) => error.data = data,
      Some(Value::Null) | None => {}
      Some(_) => {
        return Err(EngineError::invalid_value(
          "raiseErrorAction",
          "error data must be an object",
        ));
      }
    }
    Ok(error)
  }
}

#[async_trait]
impl Perform for RaiseError {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::RaiseError
  }

  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    _details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    Err(EngineError::raised(self.error(ctx).await?))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use policyflow_config::ActionModel;
  use serde_json::json;

  use super::super::testing::{Recorder, perform};
  use crate::build::{Build, Dependencies};
  use crate::data::ActionDetails;
  use crate::provider;
  use crate::services::CustomEvent;

  #[tokio::test]
  async fn test_raise_event_records_id() {
    let recorder = Arc::new(Recorder::<CustomEvent>::default());
    let model: ActionModel = serde_json::from_value(json!({"raiseEventAction": {
      "name": "Raise",
      "alias": "raise",
      "customEventAlias": "renewalDue",
      "eventData": {"contextEntityObject": "quote"},
      "eventTags": ["renewals", {"objectPathLookupText": "/automation/environment"}]
    }}))
    .unwrap();
    let action = model
      .build(&Dependencies::in_memory().with_events(recorder.clone()))
      .unwrap();
    let (details, result) = perform(&action, &provider::testing::data()).await;
    result.unwrap();
    assert_eq!(
      details,
      ActionDetails::RaiseEvent {
        custom_event_alias: Some("renewalDue".to_string()),
        event_id: Some("evt-1".to_string()),
      }
    );
    let event = &recorder.sent()[0];
    assert_eq!(event.event_tags, vec!["renewals", "staging"]);
    assert_eq!(event.product_alias.as_deref(), Some("motor"));
    assert_eq!(event.event_data.as_ref().unwrap()["id"], json!("q-1"));
  }

  #[tokio::test]
  async fn test_raise_error_builds_structured_error() {
    let model: ActionModel = serde_json::from_value(json!({"raiseErrorAction": {
      "name": "Fail",
      "alias": "fail",
      "error": {
        "code": "quote.too.young",
        "title": "Driver too young",
        "message": {"concatenatedText": ["Quote ", {"objectPathLookupText": "/context/quote/quoteNumber"}]},
        "httpStatusCode": 422,
        "additionalDetails": ["check the driver list"],
        "data": {"dynamicObject": [{"propertyName": "minimumAge", "value": 21}]}
      }
    }}))
    .unwrap();
    let action = model.build(&Dependencies::in_memory()).unwrap();
    let (details, result) = perform(&action, &provider::testing::data()).await;
    assert_eq!(details, ActionDetails::RaiseError);
    let error = result.unwrap_err().to_error();
    assert_eq!(error.code, "quote.too.young");
    assert_eq!(error.message, "Quote Q-0001");
    assert_eq!(error.http_status_code, 422);
    assert_eq!(error.additional_details, vec!["check the driver list"]);
    assert_eq!(error.data["minimumAge"], json!(21));
  }
}
