use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Continue one action of an automation run in the background.
///
/// The automation data travels as JSON so the worker operates on its own
/// copy; the remaining fields identify the configuration to re-resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncActionJob {
  pub automation_data_json: String,
  pub automation_alias: String,
  pub action_alias: String,
  pub tenant_alias: String,
  #[serde(default)]
  pub organisation_alias: Option<String>,
  #[serde(default)]
  pub product_alias: Option<String>,
  #[serde(default)]
  pub environment: Option<String>,
  #[serde(default)]
  pub product_release_id: Option<String>,
  /// Run the action inline on arrival instead of queueing it again.
  #[serde(default)]
  pub is_internal: bool,
  /// Pointer to the parent action's data when the action is nested.
  #[serde(default)]
  pub parent_action_data_path: Option<String>,
}

/// Run one automation end to end, resolving its trigger from the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAutomationJob {
  pub automation_data_json: String,
  pub automation_alias: String,
  pub tenant_alias: String,
  #[serde(default)]
  pub organisation_alias: Option<String>,
  pub product_alias: String,
  pub environment: String,
  #[serde(default)]
  pub product_release_id: Option<String>,
}

/// Fire the periodic trigger `trigger_alias` of every matching automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicTriggerJob {
  pub tenant_alias: String,
  pub product_alias: String,
  pub environment: String,
  pub automation_alias: String,
  pub trigger_alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobPayload {
  AutomationAction(AsyncActionJob),
  TriggerAutomation(TriggerAutomationJob),
  PeriodicTrigger(PeriodicTriggerJob),
}

/// A job waiting to be enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
  pub queue: String,
  /// Human readable label for dashboards.
  pub display_name: String,
  pub payload: JobPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JobStatus {
  Enqueued,
  Processing,
  Succeeded,
  Failed,
}

/// A job as stored by a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
  pub job_id: String,
  pub queue: String,
  pub display_name: String,
  pub payload: JobPayload,
  pub status: JobStatus,
  pub attempts: i64,
  pub error: Option<String>,
  pub enqueued_at: DateTime<Utc>,
}

/// A cron-scheduled job registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringJob {
  pub job_id: String,
  pub cron_expression: String,
  pub time_zone_id: String,
  pub queue: String,
  pub payload: JobPayload,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_payload_is_tagged() {
    let payload = JobPayload::PeriodicTrigger(PeriodicTriggerJob {
      tenant_alias: "acme".to_string(),
      product_alias: "motor".to_string(),
      environment: "production".to_string(),
      automation_alias: "renewals".to_string(),
      trigger_alias: "nightly".to_string(),
    });
    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["type"], json!("periodicTrigger"));
    assert_eq!(value["triggerAlias"], json!("nightly"));
    assert_eq!(serde_json::from_value::<JobPayload>(value).unwrap(), payload);
  }

  #[test]
  fn test_async_action_job_defaults() {
    let job: AsyncActionJob = serde_json::from_value(json!({
      "automationDataJson": "{}",
      "automationAlias": "a",
      "actionAlias": "b",
      "tenantAlias": "acme"
    }))
    .unwrap();
    assert!(!job.is_internal);
    assert!(job.parent_action_data_path.is_none());
  }
}
