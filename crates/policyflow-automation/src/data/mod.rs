//! The mutable context threaded through one automation run.
//!
//! [`AutomationData`] is what providers evaluate pointers against and what
//! actions record their outcome into. It crosses the job queue as JSON when
//! an action continues asynchronously, so its serialized shape is a
//! contract: polymorphic sections carry a `$type` tag and entity context is
//! kept as plain JSON.

mod action;
mod trigger;

pub use action::{
  ActionData, ActionDetails, ActionStatus, EntityOperationOutcome, IterationData, PropertyUpdate,
};
pub use trigger::{
  EmailTriggerData, EventTriggerData, ExtensionPointTriggerData, HttpRequestData,
  HttpResponseData, HttpTriggerData, PeriodicTriggerData, PortalPageTriggerData, TriggerData,
};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use policyflow_config::Error;
use policyflow_config::provider::decimal_from_value;
use policyflow_pointer::{Child, Navigable, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::path::ActionPath;
use crate::provider::decimal_to_value;

/// Re-read every fractional JSON number as a decimal.
///
/// Integral values such as `120.0` become integers and fractions keep the
/// shortest decimal text. Numbers a decimal cannot hold are left as they are.
pub fn widen_numbers(value: Value) -> Value {
  match value {
    Value::Number(number) if number.is_f64() => {
      let number = Value::Number(number);
      match decimal_from_value(&number) {
        Some(decimal) => decimal_to_value(decimal),
        None => number,
      }
    }
    Value::Array(items) => Value::Array(items.into_iter().map(widen_numbers).collect()),
    Value::Object(map) => Value::Object(
      map
        .into_iter()
        .map(|(key, value)| (key, widen_numbers(value)))
        .collect(),
    ),
    other => other,
  }
}

/// Entity context numbers pass through [`widen_numbers`] on the way in and
/// out of JSON.
mod decimal_context {
  use indexmap::IndexMap;
  use serde::{Deserialize, Deserializer, Serializer};
  use serde_json::Value;

  use super::widen_numbers;

  pub fn serialize<S: Serializer>(
    context: &IndexMap<String, Value>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
      context
        .iter()
        .map(|(name, entity)| (name, widen_numbers(entity.clone()))),
    )
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<IndexMap<String, Value>, D::Error> {
    let context = IndexMap::<String, Value>::deserialize(deserializer)?;
    Ok(
      context
        .into_iter()
        .map(|(name, entity)| (name, widen_numbers(entity)))
        .collect(),
    )
  }
}

/// Which automation is running, and for whom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationInfo {
  pub tenant_alias: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub organisation_alias: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub product_alias: Option<String>,
  pub environment: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub product_release_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub automation_alias: Option<String>,
  /// Alias of the trigger that matched.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trigger_alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
  pub environment: String,
  pub created_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationData {
  pub trigger: TriggerData,
  pub automation: AutomationInfo,
  /// Top-level action records in the order the actions ran.
  #[serde(default)]
  pub actions: IndexMap<String, ActionData>,
  /// Named entities such as `quote`, `policy` or `performingUser`.
  #[serde(default, with = "decimal_context")]
  pub context: IndexMap<String, Value>,
  pub system: SystemData,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<Error>,
}

impl AutomationData {
  pub fn new(trigger: TriggerData, automation: AutomationInfo) -> Self {
    let system = SystemData {
      environment: automation.environment.clone(),
      created_timestamp: Utc::now(),
    };
    Self {
      trigger,
      automation,
      actions: IndexMap::new(),
      context: IndexMap::new(),
      system,
      error: None,
    }
  }

  pub fn with_context(mut self, name: impl Into<String>, entity: Value) -> Self {
    self.context.insert(name.into(), widen_numbers(entity));
    self
  }

  /// Replace the entity context.
  pub fn set_context(&mut self, context: IndexMap<String, Value>) {
    self.context = context
      .into_iter()
      .map(|(name, entity)| (name, widen_numbers(entity)))
      .collect();
  }

  pub fn from_json(json: &str) -> Result<Self, EngineError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn to_json(&self) -> Result<String, EngineError> {
    Ok(serde_json::to_string(self)?)
  }

  /// Id of the context quote, used to enrich raised errors.
  pub fn quote_id(&self) -> Option<String> {
    self
      .context
      .get("quote")
      .and_then(|quote| quote.get("id"))
      .and_then(|id| match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
      })
  }

  /// The map holding the last segment of `path`.
  fn container(&self, path: &ActionPath) -> Option<&IndexMap<String, ActionData>> {
    let mut map = &self.actions;
    for pair in path.segments().windows(2) {
      let parent = map.get(&pair[0].alias)?;
      map = parent.children(pair[1].via)?;
    }
    Some(map)
  }

  fn container_mut(&mut self, path: &ActionPath) -> Option<&mut IndexMap<String, ActionData>> {
    let mut map = &mut self.actions;
    for pair in path.segments().windows(2) {
      let parent = map.get_mut(&pair[0].alias)?;
      map = parent.children_mut(pair[1].via)?;
    }
    Some(map)
  }

  pub fn action_data(&self, path: &ActionPath) -> Option<&ActionData> {
    self.container(path)?.get(path.alias())
  }

  pub fn action_data_mut(&mut self, path: &ActionPath) -> Option<&mut ActionData> {
    self.container_mut(path)?.get_mut(path.alias())
  }

  /// Find the record at `path`, creating it when missing.
  ///
  /// Fails when the parent record cannot be reached, which means the parent
  /// action never ran in this context.
  pub fn ensure_action_data(
    &mut self,
    path: &ActionPath,
    create: impl FnOnce() -> ActionData,
  ) -> Result<&mut ActionData, EngineError> {
    let map = self
      .container_mut(path)
      .ok_or_else(|| EngineError::ActionDataNotFound {
        path: path.to_string(),
      })?;
    Ok(map.entry(path.alias().to_string()).or_insert_with(create))
  }

  /// The record at `path`, which must already exist.
  pub fn require_action_data(&mut self, path: &ActionPath) -> Result<&mut ActionData, EngineError> {
    self
      .action_data_mut(path)
      .ok_or_else(|| EngineError::ActionDataNotFound {
        path: path.to_string(),
      })
  }

  /// The last top-level action, in run order, that carries an error.
  pub fn latest_action_error(&self) -> Option<&Error> {
    self
      .actions
      .values()
      .rev()
      .find_map(|action| action.error.as_ref())
  }
}

fn snapshot(value: impl Serialize) -> Option<Child<'static>> {
  serde_json::to_value(value).ok().map(Child::Value)
}

impl Navigable for AutomationData {
  fn kind(&self) -> NodeKind {
    NodeKind::Object
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    match name {
      "trigger" => snapshot(&self.trigger),
      "automation" => snapshot(&self.automation),
      "actions" => Some(Child::Node(&self.actions)),
      "context" => Some(Child::Node(&self.context)),
      "system" => snapshot(&self.system),
      "error" => snapshot(&self.error),
      _ => None,
    }
  }

  fn to_value(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::path::Via;
  use policyflow_config::SystemEventType;
  use policyflow_pointer::{Pointer, Resolution};
  use rust_decimal::Decimal;
  use serde_json::json;
  use std::str::FromStr;

  fn event_data() -> AutomationData {
    AutomationData::new(
      TriggerData::Event(EventTriggerData {
        event_type: SystemEventType::QuoteCreated,
        custom_event_alias: None,
        aggregate_id: Some("q-1".to_string()),
        event_tags: vec![],
        event_data: None,
      }),
      AutomationInfo {
        tenant_alias: "acme".to_string(),
        environment: "staging".to_string(),
        ..Default::default()
      },
    )
    .with_context("quote", json!({"id": "q-1", "premium": 120}))
  }

  fn iterate_path() -> ActionPath {
    ActionPath::top("loop")
  }

  fn with_iteration(data: &mut AutomationData) {
    data.actions.insert(
      "loop".to_string(),
      ActionData::new(
        "loop",
        "Loop",
        ActionDetails::Iterate {
          current_iteration: Some(IterationData::new(0, json!({"amount": 3}))),
          iterations_completed: 0,
        },
      ),
    );
  }

  fn lookup(data: &AutomationData, pointer: &str) -> Resolution {
    Pointer::parse(pointer).unwrap().evaluate(data, None).unwrap()
  }

  #[test]
  fn test_context_numbers_are_widened_on_read() {
    let mut value = event_data().to_value();
    value["context"]["quote"] = serde_json::from_str(
      r#"{"premium": 120.0, "excess": 1.5e2, "fees": [0.1, 0.2], "rate": 0.125}"#,
    )
    .unwrap();
    let data: AutomationData = serde_json::from_value(value).unwrap();

    let quote = &data.context["quote"];
    assert!(quote["premium"].is_i64());
    assert_eq!(quote["premium"], json!(120));
    assert_eq!(quote["excess"], json!(150));
    assert_eq!(quote["rate"], json!(0.125));

    let fees: Decimal = quote["fees"]
      .as_array()
      .unwrap()
      .iter()
      .map(|fee| decimal_from_value(fee).unwrap())
      .sum();
    assert_eq!(fees, Decimal::from_str("0.3").unwrap());
  }

  #[tokio::test]
  async fn test_widened_context_survives_the_job_queue() {
    use crate::provider::{BoxProvider, ProviderContext};
    use policyflow_config::provider::{NumberProviderModel, TextProviderModel};
    use tokio_util::sync::CancellationToken;

    let data = event_data().with_context("policy", json!({"premium": 99.0, "fees": [0.1, 0.2]}));
    let restored = AutomationData::from_json(&data.to_json().unwrap()).unwrap();
    assert_eq!(restored, data);
    assert!(restored.context["policy"]["premium"].is_i64());

    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&restored, &cancel);
    let text: BoxProvider<String> = crate::provider::testing::build::<TextProviderModel>(
      json!({"templateText": {"template": "{{ context.policy.premium }}"}}),
    );
    assert_eq!(text.resolve(&ctx).await.unwrap().as_deref(), Some("99"));

    let sum: BoxProvider<Decimal> = crate::provider::testing::build::<NumberProviderModel>(json!({
      "sumNumbers": [
        {"objectPathLookupNumber": "/context/policy/fees/0"},
        {"objectPathLookupNumber": "/context/policy/fees/1"}
      ]
    }));
    assert_eq!(
      sum.resolve(&ctx).await.unwrap(),
      Some(Decimal::from_str("0.3").unwrap())
    );
  }

  #[test]
  fn test_pointer_reaches_every_section() {
    let mut data = event_data();
    with_iteration(&mut data);
    assert_eq!(
      lookup(&data, "/trigger/eventType"),
      Resolution::Found(json!("quoteCreated"))
    );
    assert_eq!(
      lookup(&data, "/context/quote/premium"),
      Resolution::Found(json!(120))
    );
    assert_eq!(
      lookup(&data, "/actions/loop/currentIteration/item/amount"),
      Resolution::Found(json!(3))
    );
    assert_eq!(
      lookup(&data, "/automation/tenantAlias"),
      Resolution::Found(json!("acme"))
    );
    assert!(matches!(
      lookup(&data, "/context/policy"),
      Resolution::Missing(_)
    ));
  }

  #[test]
  fn test_ensure_creates_nested_record() {
    let mut data = event_data();
    with_iteration(&mut data);
    let path = iterate_path().child("notify", Via::Iteration);
    data
      .ensure_action_data(&path, || {
        ActionData::new("notify", "Notify", ActionDetails::SendSms { sms: None })
      })
      .unwrap();
    assert!(data.action_data(&path).is_some());
    assert_eq!(
      lookup(&data, "/actions/loop/currentIteration/actions/notify/status"),
      Resolution::Found(json!("pending"))
    );
  }

  #[test]
  fn test_ensure_fails_without_parent_context() {
    let mut data = event_data();
    with_iteration(&mut data);
    if let ActionDetails::Iterate {
      current_iteration, ..
    } = &mut data.actions["loop"].details
    {
      *current_iteration = None;
    }
    let path = iterate_path().child("notify", Via::Iteration);
    let result = data.ensure_action_data(&path, || {
      ActionData::new("notify", "Notify", ActionDetails::SendSms { sms: None })
    });
    assert!(matches!(result, Err(EngineError::ActionDataNotFound { .. })));
  }

  #[test]
  fn test_json_round_trip() {
    let mut data = event_data();
    with_iteration(&mut data);
    let restored = AutomationData::from_json(&data.to_json().unwrap()).unwrap();
    assert_eq!(restored, data);
  }

  #[test]
  fn test_latest_action_error_is_last_in_order() {
    let mut data = event_data();
    for alias in ["a", "b", "c"] {
      data.actions.insert(
        alias.to_string(),
        ActionData::new(alias, alias, ActionDetails::RaiseError),
      );
    }
    data.actions["a"].fail(Error::new("first", "First", "first", 400));
    data.actions["c"].fail(Error::new("last", "Last", "last", 400));
    assert_eq!(data.latest_action_error().unwrap().code, "last");
    assert_eq!(data.quote_id().as_deref(), Some("q-1"));
  }
}
