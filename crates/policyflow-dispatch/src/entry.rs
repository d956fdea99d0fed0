//! Entry points that start automation runs: system events, inbound HTTP
//! requests and periodic ticks.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use policyflow_automation::data::{
  EventTriggerData, HttpRequestData, HttpTriggerData, PeriodicTriggerData,
};
use policyflow_automation::{AutomationData, AutomationInfo, EngineError, TriggerData};
use policyflow_config::SystemEventType;
use policyflow_jobs::{Job, JobPayload, JobQueue, PeriodicTriggerJob, TriggerAutomationJob};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::DispatchError;
use crate::provider::{ConfigurationProvider, ReleaseContext};
use crate::settings::DispatchSettings;

/// A domain event raised by the platform.
#[derive(Debug, Clone)]
pub struct SystemEvent {
  pub tenant_alias: String,
  pub organisation_alias: Option<String>,
  /// `None` for tenant, organisation and user level events.
  pub product_alias: Option<String>,
  pub environment: String,
  pub event_type: SystemEventType,
  pub custom_event_alias: Option<String>,
  pub aggregate_id: Option<String>,
  pub event_tags: Vec<String>,
  pub event_data: Option<Value>,
  /// Entities made available to providers, such as `quote` or `policy`.
  pub context: IndexMap<String, Value>,
}

impl SystemEvent {
  pub fn new(
    tenant_alias: impl Into<String>,
    environment: impl Into<String>,
    event_type: SystemEventType,
  ) -> Self {
    Self {
      tenant_alias: tenant_alias.into(),
      organisation_alias: None,
      product_alias: None,
      environment: environment.into(),
      event_type,
      custom_event_alias: None,
      aggregate_id: None,
      event_tags: Vec::new(),
      event_data: None,
      context: IndexMap::new(),
    }
  }

  pub fn with_product(mut self, product_alias: impl Into<String>) -> Self {
    self.product_alias = Some(product_alias.into());
    self
  }

  pub fn with_context(mut self, name: impl Into<String>, entity: Value) -> Self {
    self.context.insert(name.into(), entity);
    self
  }
}

/// An inbound request for a tenant's automation endpoints.
#[derive(Debug, Clone)]
pub struct HttpEntryRequest {
  pub tenant_alias: String,
  pub organisation_alias: Option<String>,
  pub product_alias: String,
  pub environment: String,
  pub request: HttpRequestData,
  pub context: IndexMap<String, Value>,
}

/// Starts automation runs from outside events.
pub struct AutomationDispatcher {
  provider: Arc<dyn ConfigurationProvider>,
  jobs: Arc<dyn JobQueue>,
  settings: DispatchSettings,
}

impl AutomationDispatcher {
  pub fn new(
    provider: Arc<dyn ConfigurationProvider>,
    jobs: Arc<dyn JobQueue>,
    settings: DispatchSettings,
  ) -> Self {
    Self {
      provider,
      jobs,
      settings,
    }
  }

  pub fn provider(&self) -> &Arc<dyn ConfigurationProvider> {
    &self.provider
  }

  pub fn settings(&self) -> &DispatchSettings {
    &self.settings
  }

  /// Queue one run per automation the event triggers.
  ///
  /// Each matching automation gets its own job so a slow or failing
  /// automation never holds up the others. Returns the ids of the queued
  /// jobs; an environment without a configuration queues nothing.
  #[instrument(
    name = "dispatch_event",
    skip(self, event, cancel),
    fields(tenant = %event.tenant_alias, event_type = %event.event_type.as_str())
  )]
  pub async fn handle_event(
    &self,
    event: SystemEvent,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, DispatchError> {
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled.into());
    }
    let product_alias = match &event.product_alias {
      Some(product_alias) => product_alias.clone(),
      None => self
        .settings
        .fallback_product(&event.tenant_alias)
        .map(str::to_string)
        .ok_or_else(|| DispatchError::ProductNotResolved {
          tenant_alias: event.tenant_alias.clone(),
        })?,
    };
    let release = self
      .provider
      .current_release(&event.tenant_alias, &product_alias, &event.environment)
      .await?;
    let Some(configuration) = self.provider.configuration(&release).await? else {
      info!(product = %product_alias, "configuration_not_found");
      return Ok(Vec::new());
    };

    let organisation_alias = event.organisation_alias.clone();
    let data = event_data(event, &release);
    let automation_data_json = data.to_json()?;
    let mut job_ids = Vec::new();
    for automation in configuration.matching_automations(&data) {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled.into());
      }
      let job = Job {
        queue: self.settings.automation_queue.clone(),
        display_name: format!(
          "{}/{}/{}: {}",
          release.tenant_alias,
          release.product_alias,
          release.environment,
          automation.alias()
        ),
        payload: JobPayload::TriggerAutomation(TriggerAutomationJob {
          automation_data_json: automation_data_json.clone(),
          automation_alias: automation.alias().to_string(),
          tenant_alias: release.tenant_alias.clone(),
          organisation_alias: organisation_alias.clone(),
          product_alias: release.product_alias.clone(),
          environment: release.environment.clone(),
          product_release_id: release.product_release_id.clone(),
        }),
      };
      let job_id = self.jobs.enqueue(job).await?;
      info!(automation_alias = %automation.alias(), job_id = %job_id, "automation_job_enqueued");
      job_ids.push(job_id);
    }
    Ok(job_ids)
  }

  /// Run one automation queued by [`handle_event`](Self::handle_event).
  #[instrument(
    name = "dispatch_triggered",
    skip(self, job, cancel),
    fields(tenant = %job.tenant_alias, automation_alias = %job.automation_alias)
  )]
  pub async fn run_triggered(
    &self,
    job: &TriggerAutomationJob,
    cancel: &CancellationToken,
  ) -> Result<(), DispatchError> {
    let release = ReleaseContext::new(&job.tenant_alias, &job.product_alias, &job.environment)
      .with_release(job.product_release_id.clone());
    let Some(configuration) = self.provider.configuration(&release).await? else {
      warn!("configuration_not_found");
      return Ok(());
    };
    let Some(automation) = configuration.automation(&job.automation_alias) else {
      warn!("automation_not_found");
      return Ok(());
    };

    let mut data = AutomationData::from_json(&job.automation_data_json)?;
    automation.execute(&mut data, None, cancel).await?;
    Ok(())
  }

  /// Run the automation owning the most specific route for `request`.
  ///
  /// Returns the automation data after the run, with the response in its
  /// HTTP trigger data, or `None` when no route matches.
  #[instrument(
    name = "dispatch_http",
    skip(self, request, cancel),
    fields(
      tenant = %request.tenant_alias,
      verb = %request.request.http_verb,
      path = %request.request.path
    )
  )]
  pub async fn handle_http(
    &self,
    request: HttpEntryRequest,
    cancel: &CancellationToken,
  ) -> Result<Option<AutomationData>, DispatchError> {
    let release = self
      .provider
      .current_release(
        &request.tenant_alias,
        &request.product_alias,
        &request.environment,
      )
      .await?;
    let Some(configuration) = self.provider.configuration(&release).await? else {
      info!("configuration_not_found");
      return Ok(None);
    };

    let trigger = TriggerData::Http(HttpTriggerData {
      http_request: request.request,
      http_response: None,
    });
    let mut data = AutomationData::new(trigger, automation_info(&release, request.organisation_alias));
    data.set_context(request.context);

    let Some((automation, trigger)) = configuration.best_http_match(&data) else {
      info!("http_route_not_matched");
      return Ok(None);
    };
    automation.execute(&mut data, Some(trigger), cancel).await?;
    Ok(Some(data))
  }

  /// Fire one periodic trigger registered by the
  /// [`PeriodicRegistrar`](crate::PeriodicRegistrar).
  #[instrument(
    name = "dispatch_periodic",
    skip(self, job, cancel),
    fields(
      tenant = %job.tenant_alias,
      automation_alias = %job.automation_alias,
      trigger_alias = %job.trigger_alias
    )
  )]
  pub async fn run_periodic(
    &self,
    job: &PeriodicTriggerJob,
    cancel: &CancellationToken,
  ) -> Result<(), DispatchError> {
    let release = self
      .provider
      .current_release(&job.tenant_alias, &job.product_alias, &job.environment)
      .await?;
    let Some(configuration) = self.provider.configuration(&release).await? else {
      warn!("configuration_not_found");
      return Ok(());
    };
    let Some(automation) = configuration.automation(&job.automation_alias) else {
      warn!("automation_not_found");
      return Ok(());
    };
    let Some(trigger) = automation.trigger(&job.trigger_alias) else {
      warn!("trigger_not_found");
      return Ok(());
    };

    let fired = TriggerData::Periodic(PeriodicTriggerData {
      trigger_alias: job.trigger_alias.clone(),
      fired_timestamp: Utc::now(),
    });
    let mut data = AutomationData::new(fired, automation_info(&release, None));
    automation.execute(&mut data, Some(trigger), cancel).await?;
    Ok(())
  }
}

fn automation_info(release: &ReleaseContext, organisation_alias: Option<String>) -> AutomationInfo {
  AutomationInfo {
    tenant_alias: release.tenant_alias.clone(),
    organisation_alias,
    product_alias: Some(release.product_alias.clone()),
    environment: release.environment.clone(),
    product_release_id: release.product_release_id.clone(),
    ..Default::default()
  }
}

fn event_data(event: SystemEvent, release: &ReleaseContext) -> AutomationData {
  let trigger = TriggerData::Event(EventTriggerData {
    event_type: event.event_type,
    custom_event_alias: event.custom_event_alias,
    aggregate_id: event.aggregate_id,
    event_tags: event.event_tags,
    event_data: event.event_data,
  });
  let mut data = AutomationData::new(trigger, automation_info(release, event.organisation_alias));
  data.set_context(event.context);
  data
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use policyflow_automation::Dependencies;
  use policyflow_jobs::InMemoryJobStore;
  use serde_json::json;
  use tokio::fs;

  use super::*;
  use crate::provider::FsConfigurationProvider;

  async fn deploy(root: &Path, product: &str, configuration: Value) {
    let dir = root.join("acme").join(product).join("production");
    fs::create_dir_all(&dir).await.unwrap();
    fs::write(dir.join("automations.json"), configuration.to_string())
      .await
      .unwrap();
  }

  fn on_event(alias: &str, event_type: &str) -> Value {
    json!({
      "name": alias,
      "alias": alias,
      "triggers": [
        {"eventTrigger": {"name": "On event", "alias": "onEvent", "eventTypes": [event_type]}}
      ]
    })
  }

  fn dispatcher(root: &Path, store: &InMemoryJobStore) -> AutomationDispatcher {
    let settings = DispatchSettings {
      configuration_root: root.to_path_buf(),
      tenant_fallback_products: [("acme".to_string(), "tenantHost".to_string())].into(),
      ..Default::default()
    };
    let provider = FsConfigurationProvider::new(root, Dependencies::in_memory());
    AutomationDispatcher::new(Arc::new(provider), Arc::new(store.clone()), settings)
  }

  #[tokio::test]
  async fn test_event_fans_out_one_job_per_match() {
    let dir = tempfile::tempdir().unwrap();
    deploy(
      dir.path(),
      "motor",
      json!({"automations": [
        on_event("welcome", "quoteCreated"),
        on_event("audit", "quoteCreated"),
        on_event("renewal", "policyRenewed")
      ]}),
    )
    .await;
    let store = InMemoryJobStore::new();
    let dispatcher = dispatcher(dir.path(), &store);

    let event = SystemEvent::new("acme", "production", SystemEventType::QuoteCreated)
      .with_product("motor")
      .with_context("quote", json!({"id": "q-1"}));
    let job_ids = dispatcher
      .handle_event(event, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(job_ids.len(), 2);

    let jobs = store.jobs();
    let aliases: Vec<_> = jobs
      .iter()
      .map(|job| match &job.payload {
        JobPayload::TriggerAutomation(job) => job.automation_alias.clone(),
        other => panic!("unexpected payload {:?}", other),
      })
      .collect();
    assert_eq!(aliases, vec!["welcome", "audit"]);
    assert_eq!(jobs[0].display_name, "acme/motor/production: welcome");

    let JobPayload::TriggerAutomation(job) = &jobs[0].payload else {
      unreachable!();
    };
    let data = AutomationData::from_json(&job.automation_data_json).unwrap();
    assert_eq!(data.context["quote"], json!({"id": "q-1"}));
    assert_eq!(data.automation.product_alias.as_deref(), Some("motor"));
  }

  #[tokio::test]
  async fn test_event_without_product_uses_tenant_fallback() {
    let dir = tempfile::tempdir().unwrap();
    deploy(
      dir.path(),
      "tenantHost",
      json!({"automations": [on_event("greet", "userCreated")]}),
    )
    .await;
    let store = InMemoryJobStore::new();
    let dispatcher = dispatcher(dir.path(), &store);

    let event = SystemEvent::new("acme", "production", SystemEventType::UserCreated);
    let job_ids = dispatcher
      .handle_event(event, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(job_ids.len(), 1);

    let event = SystemEvent::new("globex", "production", SystemEventType::UserCreated);
    let result = dispatcher.handle_event(event, &CancellationToken::new()).await;
    assert!(matches!(
      result,
      Err(DispatchError::ProductNotResolved { .. })
    ));
  }

  #[tokio::test]
  async fn test_event_for_undeployed_product_queues_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryJobStore::new();
    let dispatcher = dispatcher(dir.path(), &store);

    let event =
      SystemEvent::new("acme", "production", SystemEventType::QuoteCreated).with_product("boat");
    let job_ids = dispatcher
      .handle_event(event, &CancellationToken::new())
      .await
      .unwrap();
    assert!(job_ids.is_empty());
    assert!(store.jobs().is_empty());
  }

  #[tokio::test]
  async fn test_http_picks_most_specific_route_across_automations() {
    let dir = tempfile::tempdir().unwrap();
    let route = |alias: &str, path: &str, status: u16| {
      json!({
        "name": alias,
        "alias": alias,
        "triggers": [{"httpTrigger": {
          "name": alias,
          "alias": alias,
          "endpoint": {"httpVerb": "GET", "path": path},
          "httpResponse": {"httpStatusCode": status}
        }}]
      })
    };
    deploy(
      dir.path(),
      "motor",
      json!({"automations": [
        route("anyClaim", "/claims/{claimId}", 200),
        route("openClaims", "/claims/open", 203)
      ]}),
    )
    .await;
    let store = InMemoryJobStore::new();
    let dispatcher = dispatcher(dir.path(), &store);
    let request = |path: &str| HttpEntryRequest {
      tenant_alias: "acme".to_string(),
      organisation_alias: None,
      product_alias: "motor".to_string(),
      environment: "production".to_string(),
      request: HttpRequestData {
        http_verb: "GET".to_string(),
        path: path.to_string(),
        ..Default::default()
      },
      context: IndexMap::new(),
    };

    let data = dispatcher
      .handle_http(request("/claims/open"), &CancellationToken::new())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(data.automation.automation_alias.as_deref(), Some("openClaims"));
    let TriggerData::Http(http) = &data.trigger else {
      panic!("expected http trigger data");
    };
    assert_eq!(http.http_response.as_ref().unwrap().http_status_code, 203);

    let none = dispatcher
      .handle_http(request("/policies/1"), &CancellationToken::new())
      .await
      .unwrap();
    assert!(none.is_none());
  }
}
