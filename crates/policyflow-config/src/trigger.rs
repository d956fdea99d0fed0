use std::sync::LazyLock;

use serde::Deserialize;

use crate::event::SystemEventType;
use crate::provider::{
  ConditionProviderModel, IntegerProviderModel, ObjectProviderModel, TextProviderModel,
};
use crate::registry::{TypeMap, discriminated, variant};

/// Fields every trigger carries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCommon {
  pub name: String,
  pub alias: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub run_condition: Option<ConditionProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointModel {
  /// Route template, e.g. `/claims/{claimId}`.
  pub path: String,
  #[serde(default = "default_verb")]
  pub http_verb: String,
}

fn default_verb() -> String {
  "GET".to_string()
}

impl EndpointModel {
  /// The route with every `{parameter}` segment replaced by one placeholder,
  /// so `/foo/{id}` and `/foo/{name}` compare equal.
  pub fn route_shape(&self) -> String {
    route_shape(&self.path)
  }
}

pub fn route_shape(path: &str) -> String {
  let shape: Vec<String> = path
    .trim()
    .trim_matches('/')
    .split('/')
    .map(|segment| {
      if segment.starts_with('{') && segment.ends_with('}') {
        "{}".to_string()
      } else {
        segment.to_ascii_lowercase()
      }
    })
    .collect();
  format!("/{}", shape.join("/"))
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseModel {
  #[serde(default)]
  pub http_status_code: Option<IntegerProviderModel>,
  #[serde(default)]
  pub content_type: Option<TextProviderModel>,
  #[serde(default)]
  pub content: Option<ObjectProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTriggerModel {
  #[serde(flatten)]
  pub common: TriggerCommon,
  pub endpoint: EndpointModel,
  #[serde(default)]
  pub http_response: Option<HttpResponseModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTriggerModel {
  #[serde(flatten)]
  pub common: TriggerCommon,
  #[serde(default)]
  pub event_types: Vec<SystemEventType>,
  /// Aliases of custom events raised by `raiseEventAction`.
  #[serde(default)]
  pub custom_event_aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicTriggerModel {
  #[serde(flatten)]
  pub common: TriggerCommon,
  pub cron_expression: String,
  #[serde(default)]
  pub time_zone_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPointTriggerModel {
  #[serde(flatten)]
  pub common: TriggerCommon,
  /// Hook name, e.g. `beforeQuoteCalculation`.
  pub extension_point: String,
  #[serde(default)]
  pub return_value: Option<ObjectProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalPageTriggerModel {
  #[serde(flatten)]
  pub common: TriggerCommon,
  pub entity_type: String,
  /// `display` or `list`.
  pub page_type: String,
  #[serde(default)]
  pub tab: Option<String>,
  #[serde(default)]
  pub response: Option<ObjectProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTriggerModel {
  #[serde(flatten)]
  pub common: TriggerCommon,
  /// Only mail sent to this address matches; any address when absent.
  #[serde(default)]
  pub email_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerModel {
  Http(HttpTriggerModel),
  Event(EventTriggerModel),
  Periodic(PeriodicTriggerModel),
  ExtensionPoint(ExtensionPointTriggerModel),
  PortalPage(PortalPageTriggerModel),
  Email(EmailTriggerModel),
}

impl TriggerModel {
  pub fn common(&self) -> &TriggerCommon {
    match self {
      Self::Http(t) => &t.common,
      Self::Event(t) => &t.common,
      Self::Periodic(t) => &t.common,
      Self::ExtensionPoint(t) => &t.common,
      Self::PortalPage(t) => &t.common,
      Self::Email(t) => &t.common,
    }
  }

  pub fn alias(&self) -> &str {
    &self.common().alias
  }
}

pub static TRIGGERS: LazyLock<TypeMap<TriggerModel>> = LazyLock::new(|| {
  TypeMap::new("trigger")
    .register("httpTrigger", variant!(TriggerModel::Http))
    .register("eventTrigger", variant!(TriggerModel::Event))
    .register("periodicTrigger", variant!(TriggerModel::Periodic))
    .register("extensionPointTrigger", variant!(TriggerModel::ExtensionPoint))
    .register("portalPageTrigger", variant!(TriggerModel::PortalPage))
    .register("emailTrigger", variant!(TriggerModel::Email))
});

discriminated!(TriggerModel, TRIGGERS);
