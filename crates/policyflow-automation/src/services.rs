//! External collaborators the actions talk to.
//!
//! Each is a trait so deployments can plug in real mail, SMS, event and
//! quote services. The defaults here log instead of delivering, keep
//! entities in memory, and send HTTP requests with `reqwest`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use policyflow_config::Error;
use reqwest::{Client, Method};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use tracing::info;

/// A file produced by a file provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
  pub file_name: String,
  #[serde(serialize_with = "as_base64")]
  pub content: Vec<u8>,
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&STANDARD.encode(bytes))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
  pub to: String,
  pub from: Option<String>,
  pub cc: Vec<String>,
  pub subject: String,
  pub text_body: Option<String>,
  pub html_body: Option<String>,
  /// Only names are kept when the message is recorded.
  #[serde(skip)]
  pub attachments: Vec<FileAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
  pub to: String,
  pub from: Option<String>,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestMessage {
  pub http_verb: String,
  pub url: String,
  pub headers: Vec<(String, String)>,
  pub content_type: Option<String>,
  pub content: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseMessage {
  pub http_status_code: u16,
  pub headers: Map<String, Value>,
  pub content: Value,
}

/// A custom event raised by `raiseEventAction`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
  pub tenant_alias: String,
  pub product_alias: Option<String>,
  pub environment: String,
  pub custom_event_alias: String,
  pub event_data: Option<Value>,
  pub event_tags: Vec<String>,
}

/// Identifies a quote, policy, customer or other entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
  pub entity_type: String,
  pub entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
  pub tenant_alias: String,
  pub product_alias: Option<String>,
  pub environment: String,
  pub quote_type: String,
  pub policy: Option<EntityReference>,
  pub customer: Option<EntityReference>,
  pub form_data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuoteOperation {
  IssuePolicy,
  ApproveQuote,
  DeclineQuote,
  RenewPolicy,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
  async fn send(&self, email: &EmailMessage) -> Result<(), Error>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
  async fn send(&self, sms: &SmsMessage) -> Result<(), Error>;
}

#[async_trait]
pub trait HttpSender: Send + Sync {
  async fn send(&self, request: &HttpRequestMessage) -> Result<HttpResponseMessage, Error>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
  /// Publish the event; returns its id.
  async fn publish(&self, event: &CustomEvent) -> Result<String, Error>;
}

#[async_trait]
pub trait EntityRepository: Send + Sync {
  async fn get(&self, entity: &EntityReference) -> Result<Option<Value>, Error>;

  async fn get_additional_property_value(
    &self,
    entity: &EntityReference,
    property_alias: &str,
  ) -> Result<Option<Value>, Error>;

  async fn set_additional_property_value(
    &self,
    entity: &EntityReference,
    property_alias: &str,
    value: Value,
  ) -> Result<(), Error>;

  async fn attach_files(
    &self,
    entity: &EntityReference,
    files: &[FileAttachment],
  ) -> Result<(), Error>;
}

#[async_trait]
pub trait QuoteService: Send + Sync {
  /// Create a quote; returns it, including its `id`.
  async fn create_quote(&self, request: &CreateQuoteRequest) -> Result<Value, Error>;

  async fn perform(
    &self,
    operation: QuoteOperation,
    entity: &EntityReference,
    form_data: Option<&Value>,
  ) -> Result<Value, Error>;
}

/// Logs outgoing mail instead of delivering it.
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
  async fn send(&self, email: &EmailMessage) -> Result<(), Error> {
    info!(
      to = %email.to,
      subject = %email.subject,
      attachments = email.attachments.len(),
      "email_sent"
    );
    Ok(())
  }
}

/// Logs outgoing text messages instead of delivering them.
pub struct LoggingSmsSender;

#[async_trait]
impl SmsSender for LoggingSmsSender {
  async fn send(&self, sms: &SmsMessage) -> Result<(), Error> {
    info!(to = %sms.to, length = sms.message.len(), "sms_sent");
    Ok(())
  }
}

/// Logs raised events and hands out fresh ids.
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
  async fn publish(&self, event: &CustomEvent) -> Result<String, Error> {
    let event_id = uuid::Uuid::new_v4().to_string();
    info!(
      event_id = %event_id,
      custom_event_alias = %event.custom_event_alias,
      tenant = %event.tenant_alias,
      "custom_event_raised"
    );
    Ok(event_id)
  }
}

/// Sends requests over the network.
#[derive(Default)]
pub struct ReqwestHttpSender {
  client: Client,
}

impl ReqwestHttpSender {
  pub fn new() -> Self {
    Self::default()
  }
}

fn parse_method(verb: &str) -> Result<Method, Error> {
  match verb.to_uppercase().as_str() {
    "GET" => Ok(Method::GET),
    "POST" => Ok(Method::POST),
    "PUT" => Ok(Method::PUT),
    "DELETE" => Ok(Method::DELETE),
    "PATCH" => Ok(Method::PATCH),
    "HEAD" => Ok(Method::HEAD),
    "OPTIONS" => Ok(Method::OPTIONS),
    _ => Err(
      Error::new(
        "automation.http.request.invalid.verb",
        "Invalid HTTP verb",
        format!("unsupported HTTP verb: {}", verb),
        400,
      )
      .with_data("httpVerb", verb),
    ),
  }
}

fn request_failed(url: &str, err: reqwest::Error) -> Error {
  Error::new(
    "automation.http.request.failed",
    "HTTP request failed",
    err.to_string(),
    502,
  )
  .with_data("url", url)
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
  async fn send(&self, request: &HttpRequestMessage) -> Result<HttpResponseMessage, Error> {
    let method = parse_method(&request.http_verb)?;
    let mut builder = self.client.request(method, &request.url);
    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }
    if let Some(content_type) = &request.content_type {
      builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
    }
    match (&request.content, request.content_type.as_deref()) {
      (Some(Value::String(text)), Some(ct)) if !ct.contains("json") => {
        builder = builder.body(text.clone());
      }
      (Some(content), _) => builder = builder.json(content),
      (None, _) => {}
    }

    let response = builder
      .send()
      .await
      .map_err(|e| request_failed(&request.url, e))?;
    let http_status_code = response.status().as_u16();
    let headers: Map<String, Value> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_string(), Value::String(val.to_string())))
      })
      .collect();
    let body = response
      .text()
      .await
      .map_err(|e| request_failed(&request.url, e))?;
    // JSON bodies are kept structured so later pointers can reach into them.
    let content = serde_json::from_str(&body).unwrap_or(Value::String(body));

    Ok(HttpResponseMessage {
      http_status_code,
      headers,
      content,
    })
  }
}

#[derive(Default)]
struct EntityState {
  entities: HashMap<EntityReference, Value>,
  attachments: HashMap<EntityReference, Vec<String>>,
}

/// Entities and quote operations kept in process memory.
///
/// Additional property values live under the entity's
/// `additionalProperties` object.
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
  state: Arc<Mutex<EntityState>>,
}

impl InMemoryEntityStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, entity_type: &str, entity: Value) {
    let entity_id = match entity.get("id") {
      Some(Value::String(id)) => id.clone(),
      Some(other) => other.to_string(),
      None => uuid::Uuid::new_v4().to_string(),
    };
    let key = EntityReference {
      entity_type: entity_type.to_string(),
      entity_id,
    };
    self.state.lock().entities.insert(key, entity);
  }

  pub fn entity(&self, entity_type: &str, entity_id: &str) -> Option<Value> {
    let key = EntityReference {
      entity_type: entity_type.to_string(),
      entity_id: entity_id.to_string(),
    };
    self.state.lock().entities.get(&key).cloned()
  }

  /// Names of the files attached to an entity.
  pub fn attachments(&self, entity_type: &str, entity_id: &str) -> Vec<String> {
    let key = EntityReference {
      entity_type: entity_type.to_string(),
      entity_id: entity_id.to_string(),
    };
    self
      .state
      .lock()
      .attachments
      .get(&key)
      .cloned()
      .unwrap_or_default()
  }
}

pub(crate) fn entity_not_found(entity: &EntityReference) -> Error {
  Error::new(
    "automation.entity.not.found",
    "Entity not found",
    format!("{} '{}' was not found", entity.entity_type, entity.entity_id),
    404,
  )
  .with_data("entityType", entity.entity_type.clone())
  .with_data("entityId", entity.entity_id.clone())
}

#[async_trait]
impl EntityRepository for InMemoryEntityStore {
  async fn get(&self, entity: &EntityReference) -> Result<Option<Value>, Error> {
    Ok(self.state.lock().entities.get(entity).cloned())
  }

  async fn get_additional_property_value(
    &self,
    entity: &EntityReference,
    property_alias: &str,
  ) -> Result<Option<Value>, Error> {
    let state = self.state.lock();
    let stored = state
      .entities
      .get(entity)
      .ok_or_else(|| entity_not_found(entity))?;
    Ok(
      stored
        .get("additionalProperties")
        .and_then(|props| props.get(property_alias))
        .cloned(),
    )
  }

  async fn set_additional_property_value(
    &self,
    entity: &EntityReference,
    property_alias: &str,
    value: Value,
  ) -> Result<(), Error> {
    let mut state = self.state.lock();
    let stored = state
      .entities
      .get_mut(entity)
      .ok_or_else(|| entity_not_found(entity))?;
    let Value::Object(map) = stored else {
      return Err(entity_not_found(entity));
    };
    let properties = map
      .entry("additionalProperties")
      .or_insert_with(|| json!({}));
    if let Value::Object(properties) = properties {
      properties.insert(property_alias.to_string(), value);
    }
    Ok(())
  }

  async fn attach_files(
    &self,
    entity: &EntityReference,
    files: &[FileAttachment],
  ) -> Result<(), Error> {
    let mut state = self.state.lock();
    if !state.entities.contains_key(entity) {
      return Err(entity_not_found(entity));
    }
    state
      .attachments
      .entry(entity.clone())
      .or_default()
      .extend(files.iter().map(|f| f.file_name.clone()));
    Ok(())
  }
}

#[async_trait]
impl QuoteService for InMemoryEntityStore {
  async fn create_quote(&self, request: &CreateQuoteRequest) -> Result<Value, Error> {
    let quote = json!({
      "id": uuid::Uuid::new_v4().to_string(),
      "quoteType": request.quote_type,
      "productAlias": request.product_alias,
      "policyId": request.policy.as_ref().map(|p| p.entity_id.clone()),
      "customerId": request.customer.as_ref().map(|c| c.entity_id.clone()),
      "formData": request.form_data,
      "state": "incomplete",
    });
    self.insert("quote", quote.clone());
    Ok(quote)
  }

  async fn perform(
    &self,
    operation: QuoteOperation,
    entity: &EntityReference,
    form_data: Option<&Value>,
  ) -> Result<Value, Error> {
    let state = match operation {
      QuoteOperation::IssuePolicy => "issued",
      QuoteOperation::ApproveQuote => "approved",
      QuoteOperation::DeclineQuote => "declined",
      QuoteOperation::RenewPolicy => "renewed",
    };
    let mut guard = self.state.lock();
    let stored = guard
      .entities
      .get_mut(entity)
      .ok_or_else(|| entity_not_found(entity))?;
    if let Value::Object(map) = &mut *stored {
      map.insert("state".to_string(), json!(state));
      if let Some(form_data) = form_data {
        map.insert("formData".to_string(), form_data.clone());
      }
    }
    Ok(stored.clone())
  }
}
