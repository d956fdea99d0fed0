use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use policyflow_config::Error;
use policyflow_pointer::{Child, Data, Navigable, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::Via;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionStatus {
  Pending,
  /// Handed to the job queue; the continuation will pick it up.
  Queued,
  Started,
  Completed,
  Failed,
  /// The action's run condition resolved false.
  Skipped,
}

/// The per-run record of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
  pub alias: String,
  pub name: String,
  pub status: ActionStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<Error>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub started_timestamp: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub finished_timestamp: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub on_error_actions: IndexMap<String, ActionData>,
  #[serde(flatten)]
  pub details: ActionDetails,
}

/// Kind-specific part of [`ActionData`], tagged with `$type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionDetails {
  SendEmail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<Value>,
  },
  SendSms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sms: Option<Value>,
  },
  HttpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http_request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http_response: Option<Value>,
  },
  RaiseEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_event_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
  },
  RaiseError,
  SetAdditionalPropertyValue(PropertyUpdate),
  IncrementAdditionalPropertyValue(PropertyUpdate),
  CreateQuote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quote: Option<Value>,
  },
  IssuePolicy(EntityOperationOutcome),
  ApproveQuote(EntityOperationOutcome),
  DeclineQuote(EntityOperationOutcome),
  RenewPolicy(EntityOperationOutcome),
  AttachFilesToEntity {
    #[serde(default)]
    entity_ids: Vec<String>,
    #[serde(default)]
    file_names: Vec<String>,
  },
  Group {
    #[serde(default)]
    child_actions: IndexMap<String, ActionData>,
  },
  Iterate {
    /// The iteration being run, or the last one once the loop is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_iteration: Option<IterationData>,
    #[serde(default)]
    iterations_completed: i64,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entity_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entity_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub property_alias: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOperationOutcome {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entity_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
}

/// Context of one pass through an iterate action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationData {
  pub index: i64,
  pub item: Data<Value>,
  #[serde(default)]
  pub actions: IndexMap<String, ActionData>,
}

impl IterationData {
  pub fn new(index: i64, item: Value) -> Self {
    Self {
      index,
      item: Data::wrap(item),
      actions: IndexMap::new(),
    }
  }
}

impl ActionDetails {
  pub fn type_name(&self) -> &'static str {
    match self {
      Self::SendEmail { .. } => "sendEmail",
      Self::SendSms { .. } => "sendSms",
      Self::HttpRequest { .. } => "httpRequest",
      Self::RaiseEvent { .. } => "raiseEvent",
      Self::RaiseError => "raiseError",
      Self::SetAdditionalPropertyValue(_) => "setAdditionalPropertyValue",
      Self::IncrementAdditionalPropertyValue(_) => "incrementAdditionalPropertyValue",
      Self::CreateQuote { .. } => "createQuote",
      Self::IssuePolicy(_) => "issuePolicy",
      Self::ApproveQuote(_) => "approveQuote",
      Self::DeclineQuote(_) => "declineQuote",
      Self::RenewPolicy(_) => "renewPolicy",
      Self::AttachFilesToEntity { .. } => "attachFilesToEntity",
      Self::Group { .. } => "group",
      Self::Iterate { .. } => "iterate",
    }
  }
}

impl ActionData {
  pub fn new(alias: impl Into<String>, name: impl Into<String>, details: ActionDetails) -> Self {
    Self {
      alias: alias.into(),
      name: name.into(),
      status: ActionStatus::Pending,
      error: None,
      started_timestamp: None,
      finished_timestamp: None,
      on_error_actions: IndexMap::new(),
      details,
    }
  }

  pub fn action_type(&self) -> &'static str {
    self.details.type_name()
  }

  /// Mark the action as waiting on the job queue.
  pub fn toggle_status_for_async(&mut self) {
    self.status = ActionStatus::Queued;
    self.started_timestamp = None;
    self.finished_timestamp = None;
  }

  pub fn start(&mut self) {
    self.status = ActionStatus::Started;
    self.started_timestamp = Some(Utc::now());
  }

  pub fn fail(&mut self, error: Error) {
    self.status = ActionStatus::Failed;
    self.error = Some(error);
    self.finished_timestamp = Some(Utc::now());
  }

  /// Complete the action unless it already failed.
  pub fn finish(&mut self) {
    if self.error.is_none() {
      self.status = ActionStatus::Completed;
    }
    self.finished_timestamp = Some(Utc::now());
  }

  pub fn skip(&mut self) {
    self.status = ActionStatus::Skipped;
    self.finished_timestamp = Some(Utc::now());
  }

  /// Nested action data reached through `via`.
  pub fn children(&self, via: Via) -> Option<&IndexMap<String, ActionData>> {
    match (via, &self.details) {
      (Via::Child, ActionDetails::Group { child_actions }) => Some(child_actions),
      (
        Via::Iteration,
        ActionDetails::Iterate {
          current_iteration: Some(iteration),
          ..
        },
      ) => Some(&iteration.actions),
      (Via::OnError, _) => Some(&self.on_error_actions),
      _ => None,
    }
  }

  pub fn children_mut(&mut self, via: Via) -> Option<&mut IndexMap<String, ActionData>> {
    match (via, &mut self.details) {
      (Via::Child, ActionDetails::Group { child_actions }) => Some(child_actions),
      (
        Via::Iteration,
        ActionDetails::Iterate {
          current_iteration: Some(iteration),
          ..
        },
      ) => Some(&mut iteration.actions),
      (Via::OnError, _) => Some(&mut self.on_error_actions),
      _ => None,
    }
  }
}

fn to_child(value: impl Serialize) -> Option<Child<'static>> {
  serde_json::to_value(value).ok().map(Child::Value)
}

impl Navigable for ActionData {
  fn kind(&self) -> NodeKind {
    NodeKind::Object
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    match (name, &self.details) {
      ("alias", _) => to_child(&self.alias),
      ("name", _) => to_child(&self.name),
      ("$type", _) => to_child(self.action_type()),
      ("status", _) => to_child(self.status),
      ("error", _) => to_child(&self.error),
      ("startedTimestamp", _) => to_child(self.started_timestamp),
      ("finishedTimestamp", _) => to_child(self.finished_timestamp),
      ("onErrorActions", _) => Some(Child::Node(&self.on_error_actions)),
      ("childActions", ActionDetails::Group { child_actions }) => Some(Child::Node(child_actions)),
      ("currentIteration", ActionDetails::Iterate { current_iteration, .. }) => {
        Some(Child::Node(current_iteration))
      }
      (_, details) => match serde_json::to_value(details) {
        Ok(Value::Object(mut map)) => map.remove(name).map(Child::Value),
        _ => None,
      },
    }
  }

  fn to_value(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

impl Navigable for IterationData {
  fn kind(&self) -> NodeKind {
    NodeKind::Object
  }

  fn property(&self, name: &str) -> Option<Child<'_>> {
    match name {
      "index" => to_child(self.index),
      "item" => Some(Child::Node(&self.item)),
      "actions" => Some(Child::Node(&self.actions)),
      _ => None,
    }
  }

  fn to_value(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}
