//! Runtime triggers: matching incoming activations and producing the
//! response a trigger owes its caller.

use policyflow_config::trigger::HttpResponseModel;
use policyflow_config::{ConfigError, SystemEventType, TriggerModel};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::build::{Build, Dependencies};
use crate::data::{AutomationData, HttpResponseData, TriggerData};
use crate::error::EngineError;
use crate::provider::{BoxProvider, ProviderContext, resolve_optional};

const DEFAULT_STATUS: u16 = 200;
const JSON_CONTENT_TYPE: &str = "application/json";

/// One segment of an HTTP route template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RouteSegment {
  Literal(String),
  Parameter(String),
}

fn split_path(path: &str) -> Vec<&str> {
  let path = path.split('?').next().unwrap_or_default();
  path.trim().trim_matches('/').split('/').collect()
}

fn parse_route(template: &str) -> Vec<RouteSegment> {
  split_path(template)
    .into_iter()
    .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
      Some(name) => RouteSegment::Parameter(name.to_string()),
      None => RouteSegment::Literal(segment.to_ascii_lowercase()),
    })
    .collect()
}

/// Values bound by `route` for `path`, or `None` when the route does not
/// match.
fn match_route(route: &[RouteSegment], path: &str) -> Option<Map<String, Value>> {
  let segments = split_path(path);
  if segments.len() != route.len() {
    return None;
  }
  let mut parameters = Map::new();
  for (expected, actual) in route.iter().zip(segments) {
    match expected {
      RouteSegment::Literal(literal) if literal.eq_ignore_ascii_case(actual) => {}
      RouteSegment::Literal(_) => return None,
      RouteSegment::Parameter(name) => {
        parameters.insert(name.clone(), Value::String(actual.to_string()));
      }
    }
  }
  Some(parameters)
}

pub struct HttpResponse {
  status_code: Option<BoxProvider<i64>>,
  content_type: Option<BoxProvider<String>>,
  content: Option<BoxProvider<Value>>,
}

impl Build for HttpResponseModel {
  type Output = HttpResponse;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(HttpResponse {
      status_code: self.http_status_code.build(deps)?,
      content_type: self.content_type.build(deps)?,
      content: self.content.build(deps)?,
    })
  }
}

enum TriggerKind {
  Http {
    verb: String,
    route: Vec<RouteSegment>,
    response: Option<HttpResponse>,
  },
  Event {
    event_types: Vec<SystemEventType>,
    custom_event_aliases: Vec<String>,
  },
  Periodic {
    cron_expression: String,
    time_zone_id: Option<String>,
  },
  ExtensionPoint {
    extension_point: String,
    return_value: Option<BoxProvider<Value>>,
  },
  PortalPage {
    entity_type: String,
    page_type: String,
    tab: Option<String>,
    response: Option<BoxProvider<Value>>,
  },
  Email {
    email_address: Option<String>,
  },
}

/// Cron schedule of a periodic trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule<'a> {
  pub trigger_alias: &'a str,
  pub cron_expression: &'a str,
  pub time_zone_id: Option<&'a str>,
}

pub struct Trigger {
  alias: String,
  name: String,
  run_condition: Option<BoxProvider<bool>>,
  kind: TriggerKind,
}

impl Build for TriggerModel {
  type Output = Trigger;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    let kind = match self {
      Self::Http(model) => TriggerKind::Http {
        verb: model.endpoint.http_verb.to_ascii_uppercase(),
        route: parse_route(&model.endpoint.path),
        response: model.http_response.build(deps)?,
      },
      Self::Event(model) => TriggerKind::Event {
        event_types: model.event_types.clone(),
        custom_event_aliases: model.custom_event_aliases.clone(),
      },
      Self::Periodic(model) => TriggerKind::Periodic {
        cron_expression: model.cron_expression.clone(),
        time_zone_id: model.time_zone_id.clone(),
      },
      Self::ExtensionPoint(model) => TriggerKind::ExtensionPoint {
        extension_point: model.extension_point.clone(),
        return_value: model.return_value.build(deps)?,
      },
      Self::PortalPage(model) => TriggerKind::PortalPage {
        entity_type: model.entity_type.clone(),
        page_type: model.page_type.clone(),
        tab: model.tab.clone(),
        response: model.response.build(deps)?,
      },
      Self::Email(model) => TriggerKind::Email {
        email_address: model.email_address.clone(),
      },
    };
    let common = self.common();
    Ok(Trigger {
      alias: common.alias.clone(),
      name: common.name.clone(),
      run_condition: common.run_condition.build(deps)?,
      kind,
    })
  }
}

impl Trigger {
  pub fn alias(&self) -> &str {
    &self.alias
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_http(&self) -> bool {
    matches!(self.kind, TriggerKind::Http { .. })
  }

  pub fn schedule(&self) -> Option<Schedule<'_>> {
    match &self.kind {
      TriggerKind::Periodic {
        cron_expression,
        time_zone_id,
      } => Some(Schedule {
        trigger_alias: &self.alias,
        cron_expression,
        time_zone_id: time_zone_id.as_deref(),
      }),
      _ => None,
    }
  }

  /// Whether this trigger handles the activation described by `data`.
  pub fn does_match(&self, data: &AutomationData) -> bool {
    match (&self.kind, &data.trigger) {
      (TriggerKind::Http { verb, route, .. }, TriggerData::Http(http)) => {
        verb.eq_ignore_ascii_case(&http.http_request.http_verb)
          && match_route(route, &http.http_request.path).is_some()
      }
      (
        TriggerKind::Event {
          event_types,
          custom_event_aliases,
        },
        TriggerData::Event(event),
      ) => match (&event.event_type, &event.custom_event_alias) {
        (SystemEventType::Custom, Some(alias)) => custom_event_aliases.contains(alias),
        (event_type, _) => event_types.contains(event_type),
      },
      (TriggerKind::Periodic { .. }, TriggerData::Periodic(periodic)) => {
        periodic.trigger_alias == self.alias
      }
      (TriggerKind::ExtensionPoint { extension_point, .. }, TriggerData::ExtensionPoint(hook)) => {
        extension_point.eq_ignore_ascii_case(&hook.extension_point)
      }
      (
        TriggerKind::PortalPage {
          entity_type,
          page_type,
          tab,
          ..
        },
        TriggerData::PortalPage(page),
      ) => {
        entity_type.eq_ignore_ascii_case(&page.entity_type)
          && page_type.eq_ignore_ascii_case(&page.page_type)
          && tab
            .as_ref()
            .is_none_or(|tab| page.tab.as_ref().is_some_and(|t| t.eq_ignore_ascii_case(tab)))
      }
      (TriggerKind::Email { email_address }, TriggerData::Email(email)) => email_address
        .as_ref()
        .is_none_or(|address| address.eq_ignore_ascii_case(email.to.trim())),
      _ => false,
    }
  }

  /// How specifically an HTTP trigger matches: two points per literal
  /// segment, one per parameter. `None` for non-matching or non-HTTP
  /// triggers.
  pub fn match_score(&self, data: &AutomationData) -> Option<u32> {
    if !self.does_match(data) {
      return None;
    }
    let TriggerKind::Http { route, .. } = &self.kind else {
      return None;
    };
    Some(
      route
        .iter()
        .map(|segment| match segment {
          RouteSegment::Literal(_) => 2,
          RouteSegment::Parameter(_) => 1,
        })
        .sum(),
    )
  }

  /// Copy the route parameters of the matched request into the trigger data.
  pub fn bind_path_parameters(&self, data: &mut AutomationData) {
    if let (TriggerKind::Http { route, .. }, TriggerData::Http(http)) =
      (&self.kind, &mut data.trigger)
      && let Some(parameters) = match_route(route, &http.http_request.path)
    {
      http.http_request.path_parameters = parameters;
    }
  }

  /// Evaluate the trigger's own run condition; true when it has none.
  pub async fn condition_holds(&self, ctx: &ProviderContext<'_>) -> Result<bool, EngineError> {
    Ok(resolve_optional(&self.run_condition, ctx).await?.unwrap_or(true))
  }

  /// Write the response this trigger owes its caller into the trigger data.
  /// Triggers without a response contract leave the data untouched.
  pub async fn generate_completion_response(
    &self,
    data: &mut AutomationData,
    cancel: &CancellationToken,
  ) -> Result<(), EngineError> {
    match &self.kind {
      TriggerKind::Http { response, .. } => {
        let resolved = match response {
          Some(response) => {
            let ctx = ProviderContext::new(data, cancel);
            resolve_http_response(response, &ctx).await?
          }
          None => HttpResponseData {
            http_status_code: DEFAULT_STATUS,
            content_type: None,
            content: None,
          },
        };
        if let TriggerData::Http(http) = &mut data.trigger {
          http.http_response = Some(resolved);
        }
      }
      TriggerKind::PortalPage {
        response: Some(provider),
        ..
      } => {
        let value = provider.resolve(&ProviderContext::new(data, cancel)).await?;
        if let TriggerData::PortalPage(page) = &mut data.trigger {
          page.response = value;
        }
      }
      TriggerKind::ExtensionPoint {
        return_value: Some(provider),
        ..
      } => {
        let value = provider.resolve(&ProviderContext::new(data, cancel)).await?;
        if let TriggerData::ExtensionPoint(hook) = &mut data.trigger {
          hook.return_value = value;
        }
      }
      _ => {}
    }
    Ok(())
  }
}

async fn resolve_http_response(
  response: &HttpResponse,
  ctx: &ProviderContext<'_>,
) -> Result<HttpResponseData, EngineError> {
  let http_status_code = match resolve_optional(&response.status_code, ctx).await? {
    Some(code) => u16::try_from(code)
      .ok()
      .filter(|code| (100..=599).contains(code))
      .ok_or_else(|| {
        EngineError::invalid_value("httpStatusCode", format!("{} is not an HTTP status", code))
      })?,
    None => DEFAULT_STATUS,
  };
  let content = resolve_optional(&response.content, ctx).await?;
  let content_type = match resolve_optional(&response.content_type, ctx).await? {
    Some(content_type) => Some(content_type),
    None if content.is_some() => Some(JSON_CONTENT_TYPE.to_string()),
    None => None,
  };
  Ok(HttpResponseData {
    http_status_code,
    content_type,
    content,
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::data::{
    AutomationInfo, EmailTriggerData, HttpRequestData, HttpTriggerData, PeriodicTriggerData,
    PortalPageTriggerData,
  };
  use crate::provider::testing;

  fn trigger(model: Value) -> Trigger {
    testing::build::<TriggerModel>(model)
  }

  fn http_data(verb: &str, path: &str) -> AutomationData {
    AutomationData::new(
      TriggerData::Http(HttpTriggerData {
        http_request: HttpRequestData {
          http_verb: verb.to_string(),
          path: path.to_string(),
          ..Default::default()
        },
        http_response: None,
      }),
      AutomationInfo {
        tenant_alias: "acme".to_string(),
        environment: "staging".to_string(),
        ..Default::default()
      },
    )
  }

  fn http_trigger(alias: &str, verb: &str, path: &str) -> Trigger {
    trigger(json!({"httpTrigger": {
      "name": alias,
      "alias": alias,
      "endpoint": {"httpVerb": verb, "path": path}
    }}))
  }

  #[test]
  fn test_http_route_matching() {
    let trigger = http_trigger("get", "get", "/claims/{claimId}");
    assert!(trigger.does_match(&http_data("GET", "/claims/c-1")));
    assert!(trigger.does_match(&http_data("GET", "/Claims/c-1/?expand=true")));
    assert!(!trigger.does_match(&http_data("POST", "/claims/c-1")));
    assert!(!trigger.does_match(&http_data("GET", "/claims/c-1/notes")));
    assert!(!trigger.does_match(&testing::data()));
  }

  #[test]
  fn test_match_score_prefers_literals() {
    let specific = http_trigger("specific", "GET", "/claims/latest");
    let general = http_trigger("general", "GET", "/claims/{claimId}");
    let data = http_data("GET", "/claims/latest");
    assert_eq!(specific.match_score(&data), Some(4));
    assert_eq!(general.match_score(&data), Some(3));
    assert_eq!(specific.match_score(&http_data("GET", "/claims/c-1")), None);
  }

  #[test]
  fn test_bind_path_parameters() {
    let trigger = http_trigger("get", "GET", "/claims/{claimId}/notes/{noteId}");
    let mut data = http_data("GET", "/claims/c-1/notes/7");
    trigger.bind_path_parameters(&mut data);
    let TriggerData::Http(http) = &data.trigger else {
      panic!("expected http data");
    };
    assert_eq!(
      Value::Object(http.http_request.path_parameters.clone()),
      json!({"claimId": "c-1", "noteId": "7"})
    );
  }

  #[test]
  fn test_event_matching() {
    let trigger = trigger(json!({"eventTrigger": {
      "name": "Events",
      "alias": "events",
      "eventTypes": ["quoteCreated"],
      "customEventAliases": ["renewalDue"]
    }}));
    assert!(trigger.does_match(&testing::data()));

    let mut custom = testing::data();
    if let TriggerData::Event(event) = &mut custom.trigger {
      event.event_type = SystemEventType::Custom;
      event.custom_event_alias = Some("renewalDue".to_string());
    }
    assert!(trigger.does_match(&custom));
    if let TriggerData::Event(event) = &mut custom.trigger {
      event.custom_event_alias = Some("other".to_string());
    }
    assert!(!trigger.does_match(&custom));
  }

  #[test]
  fn test_periodic_matches_by_alias() {
    let trigger = trigger(json!({"periodicTrigger": {
      "name": "Nightly",
      "alias": "nightly",
      "cronExpression": "0 2 * * *"
    }}));
    let mut data = testing::data();
    data.trigger = TriggerData::Periodic(PeriodicTriggerData {
      trigger_alias: "nightly".to_string(),
      fired_timestamp: chrono::Utc::now(),
    });
    assert!(trigger.does_match(&data));
    assert_eq!(trigger.schedule().unwrap().cron_expression, "0 2 * * *");
  }

  #[test]
  fn test_portal_page_and_email_matching() {
    let page = trigger(json!({"portalPageTrigger": {
      "name": "Page",
      "alias": "page",
      "entityType": "quote",
      "pageType": "display",
      "tab": "claims"
    }}));
    let mut data = testing::data();
    data.trigger = TriggerData::PortalPage(PortalPageTriggerData {
      entity_type: "Quote".to_string(),
      page_type: "display".to_string(),
      tab: Some("claims".to_string()),
      entity_id: Some("q-1".to_string()),
      response: None,
    });
    assert!(page.does_match(&data));

    let email = trigger(json!({"emailTrigger": {
      "name": "Inbox",
      "alias": "inbox",
      "emailAddress": "claims@acme.test"
    }}));
    data.trigger = TriggerData::Email(EmailTriggerData {
      to: "Claims@acme.test".to_string(),
      from: "someone@example.test".to_string(),
      subject: "Hello".to_string(),
      text_body: None,
      html_body: None,
    });
    assert!(email.does_match(&data));
  }

  #[tokio::test]
  async fn test_http_completion_response() {
    let trigger = trigger(json!({"httpTrigger": {
      "name": "Get",
      "alias": "get",
      "endpoint": {"path": "/claims/{claimId}"},
      "httpResponse": {
        "httpStatusCode": 202,
        "content": {"dynamicObject": [
          {"propertyName": "claim", "value": {"objectPathLookupText": "/trigger/httpRequest/pathParameters/claimId"}}
        ]}
      }
    }}));
    let mut data = http_data("GET", "/claims/c-9");
    trigger.bind_path_parameters(&mut data);
    trigger
      .generate_completion_response(&mut data, &CancellationToken::new())
      .await
      .unwrap();
    let TriggerData::Http(http) = &data.trigger else {
      panic!("expected http data");
    };
    assert_eq!(
      http.http_response,
      Some(HttpResponseData {
        http_status_code: 202,
        content_type: Some("application/json".to_string()),
        content: Some(json!({"claim": "c-9"})),
      })
    );
  }

  #[tokio::test]
  async fn test_default_http_response_and_event_noop() {
    let trigger = http_trigger("get", "GET", "/ping");
    let mut data = http_data("GET", "/ping");
    trigger
      .generate_completion_response(&mut data, &CancellationToken::new())
      .await
      .unwrap();
    let TriggerData::Http(http) = &data.trigger else {
      panic!("expected http data");
    };
    assert_eq!(http.http_response.as_ref().unwrap().http_status_code, 200);

    let event = testing::build::<TriggerModel>(json!({"eventTrigger": {
      "name": "E", "alias": "e", "eventTypes": ["quoteCreated"]
    }}));
    let mut data = testing::data();
    let before = data.clone();
    event
      .generate_completion_response(&mut data, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(data, before);
  }
}
