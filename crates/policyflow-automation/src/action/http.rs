use std::sync::Arc;

use async_trait::async_trait;
use policyflow_config::action::HttpRequestActionModel;
use policyflow_config::{ConfigError, Error};
use serde_json::Value;

use super::Perform;
use crate::build::{Build, Dependencies};
use crate::data::ActionDetails;
use crate::error::EngineError;
use crate::provider::{BoxProvider, ProviderContext, resolve_optional};
use crate::services::{HttpRequestMessage, HttpSender};

pub struct HttpRequest {
  url: BoxProvider<String>,
  http_verb: Option<BoxProvider<String>>,
  headers: Vec<(BoxProvider<String>, BoxProvider<String>)>,
  content_type: Option<BoxProvider<String>>,
  content: Option<BoxProvider<Value>>,
  sender: Arc<dyn HttpSender>,
}

impl Build for HttpRequestActionModel {
  type Output = HttpRequest;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    let request = &self.http_request;
    let headers = request
      .headers
      .iter()
      .map(|header| Ok((header.name.build(deps)?, header.value.build(deps)?)))
      .collect::<Result<_, ConfigError>>()?;
    Ok(HttpRequest {
      url: request.url.build(deps)?,
      http_verb: request.http_verb.build(deps)?,
      headers,
      content_type: request.content_type.build(deps)?,
      content: request.content.build(deps)?,
      sender: deps.http.clone(),
    })
  }
}

impl HttpRequest {
  async fn message(&self, ctx: &ProviderContext<'_>) -> Result<HttpRequestMessage, EngineError> {
    let content = resolve_optional(&self.content, ctx).await?;
    let http_verb = match resolve_optional(&self.http_verb, ctx).await? {
      Some(verb) => verb.to_ascii_uppercase(),
      None if content.is_some() => "POST".to_string(),
      None => "GET".to_string(),
    };
    let mut headers = Vec::with_capacity(self.headers.len());
    for (name, value) in &self.headers {
      headers.push((
        name.require(ctx, "name").await?,
        value.require(ctx, "value").await?,
      ));
    }
    Ok(HttpRequestMessage {
      http_verb,
      url: self.url.require(ctx, "url").await?,
      headers,
      content_type: resolve_optional(&self.content_type, ctx).await?,
      content,
    })
  }
}

fn unsuccessful(url: &str, status: u16) -> Error {
  Error::new(
    "automation.http.request.unsuccessful",
    "HTTP request unsuccessful",
    format!("{} responded with status {}", url, status),
    502,
  )
  .with_data("url", url)
  .with_data("httpStatusCode", status)
}

#[async_trait]
impl Perform for HttpRequest {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::HttpRequest {
      http_request: None,
      http_response: None,
    }
  }

  /// A response outside the 2xx range is recorded and then fails the action.
  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let request = self.message(ctx).await?;
    let recorded_request = serde_json::to_value(&request)?;
    *details = ActionDetails::HttpRequest {
      http_request: Some(recorded_request.clone()),
      http_response: None,
    };
    let response = self.sender.send(&request).await.map_err(EngineError::raised)?;
    *details = ActionDetails::HttpRequest {
      http_request: Some(recorded_request),
      http_response: Some(serde_json::to_value(&response)?),
    };
    if !(200..300).contains(&response.http_status_code) {
      return Err(EngineError::raised(unsuccessful(
        &request.url,
        response.http_status_code,
      )));
    }
    Ok(())
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
  use crate::services::HttpRequestMessage;

  fn action(url: &str, recorder: Arc<Recorder<HttpRequestMessage>>) -> super::super::Action {
    let model: ActionModel = serde_json::from_value(json!({"httpRequestAction": {
      "name": "Notify",
      "alias": "notify",
      "httpRequest": {
        "url": url,
        "headers": [{"name": "X-Tenant", "value": {"objectPathLookupText": "/automation/tenantAlias"}}],
        "content": {"contextEntityObject": "quote"}
      }
    }}))
    .unwrap();
    model
      .build(&Dependencies::in_memory().with_http(recorder))
      .unwrap()
  }

  #[tokio::test]
  async fn test_request_defaults_to_post_with_content() {
    let recorder = Arc::new(Recorder::<HttpRequestMessage>::default());
    let action = action("https://hooks.example.test/quote", recorder.clone());
    let (details, result) = perform(&action, &provider::testing::data()).await;
    result.unwrap();

    let sent = recorder.sent();
    assert_eq!(sent[0].http_verb, "POST");
    assert_eq!(sent[0].headers, vec![("X-Tenant".to_string(), "acme".to_string())]);
    let ActionDetails::HttpRequest {
      http_response: Some(response),
      ..
    } = details
    else {
      panic!("expected a recorded response");
    };
    assert_eq!(response["httpStatusCode"], json!(200));
    assert_eq!(response["content"]["echo"]["quoteNumber"], json!("Q-0001"));
  }

  #[tokio::test]
  async fn test_error_status_fails_after_recording() {
    let recorder = Arc::new(Recorder::<HttpRequestMessage>::default());
    let action = action("https://hooks.example.test/fail", recorder);
    let (details, result) = perform(&action, &provider::testing::data()).await;
    let error = result.unwrap_err().to_error();
    assert_eq!(error.code, "automation.http.request.unsuccessful");
    assert_eq!(error.data["httpStatusCode"], json!(500));
    assert!(matches!(
      details,
      ActionDetails::HttpRequest {
        http_response: Some(_),
        ..
      }
    ));
  }
}
