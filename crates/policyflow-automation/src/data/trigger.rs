use chrono::{DateTime, Utc};
use policyflow_config::SystemEventType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What activated an automation run.
///
/// Tagged with `$type` so a serialized run can be rehydrated on the other
/// side of the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type", rename_all = "camelCase")]
pub enum TriggerData {
  Http(HttpTriggerData),
  Event(EventTriggerData),
  Periodic(PeriodicTriggerData),
  ExtensionPoint(ExtensionPointTriggerData),
  PortalPage(PortalPageTriggerData),
  Email(EmailTriggerData),
}

impl TriggerData {
  pub fn type_name(&self) -> &'static str {
    match self {
      Self::Http(_) => "http",
      Self::Event(_) => "event",
      Self::Periodic(_) => "periodic",
      Self::ExtensionPoint(_) => "extensionPoint",
      Self::PortalPage(_) => "portalPage",
      Self::Email(_) => "email",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTriggerData {
  pub http_request: HttpRequestData,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub http_response: Option<HttpResponseData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestData {
  pub http_verb: String,
  pub path: String,
  /// Filled from the matched route template.
  #[serde(default)]
  pub path_parameters: Map<String, Value>,
  #[serde(default)]
  pub query_parameters: Map<String, Value>,
  #[serde(default)]
  pub headers: Map<String, Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseData {
  pub http_status_code: u16,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTriggerData {
  pub event_type: SystemEventType,
  /// Set when `event_type` is `custom`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub custom_event_alias: Option<String>,
  /// Id of the aggregate the event belongs to (quote, policy, customer).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub aggregate_id: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub event_tags: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicTriggerData {
  pub trigger_alias: String,
  pub fired_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPointTriggerData {
  pub extension_point: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub return_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalPageTriggerData {
  pub entity_type: String,
  pub page_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tab: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub entity_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTriggerData {
  pub to: String,
  pub from: String,
  pub subject: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub text_body: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub html_body: Option<String>,
}
