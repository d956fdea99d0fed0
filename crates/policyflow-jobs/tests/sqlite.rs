use std::time::Duration;

use policyflow_jobs::{
  AsyncActionJob, DistributedLock, Job, JobError, JobPayload, JobQueue, JobStatus,
  PeriodicTriggerJob, RecurringJob, RecurringJobManager, SqliteJobStore,
};

async fn store() -> SqliteJobStore {
  SqliteJobStore::connect("sqlite::memory:").await.unwrap()
}

fn action_job(alias: &str) -> Job {
  Job {
    queue: "automation".to_string(),
    display_name: format!("acme/motor/staging: renewals.{alias}"),
    payload: JobPayload::AutomationAction(AsyncActionJob {
      automation_data_json: r#"{"actions":{}}"#.to_string(),
      automation_alias: "renewals".to_string(),
      action_alias: alias.to_string(),
      tenant_alias: "acme".to_string(),
      organisation_alias: Some("acme-org".to_string()),
      product_alias: Some("motor".to_string()),
      environment: Some("staging".to_string()),
      product_release_id: None,
      is_internal: false,
      parent_action_data_path: None,
    }),
  }
}

fn recurring(id: &str, cron: &str) -> RecurringJob {
  RecurringJob {
    job_id: id.to_string(),
    cron_expression: cron.to_string(),
    time_zone_id: "UTC".to_string(),
    queue: "automation".to_string(),
    payload: JobPayload::PeriodicTrigger(PeriodicTriggerJob {
      tenant_alias: "acme".to_string(),
      product_alias: "motor".to_string(),
      environment: "staging".to_string(),
      automation_alias: "renewals".to_string(),
      trigger_alias: "nightly".to_string(),
    }),
  }
}

#[tokio::test]
async fn test_enqueue_and_dequeue_in_order() {
  let store = store().await;
  let first = store.enqueue(action_job("first")).await.unwrap();
  let second = store.enqueue(action_job("second")).await.unwrap();

  let claimed = store.dequeue("automation").await.unwrap().unwrap();
  assert_eq!(claimed.job_id, first);
  assert_eq!(claimed.status, JobStatus::Processing);
  assert_eq!(claimed.attempts, 1);
  assert_eq!(claimed.payload, action_job("first").payload);

  let next = store.dequeue("automation").await.unwrap().unwrap();
  assert_eq!(next.job_id, second);
  assert!(store.dequeue("automation").await.unwrap().is_none());
  assert!(store.dequeue("other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_completion_states() {
  let store = store().await;
  let ok = store.enqueue(action_job("ok")).await.unwrap();
  let bad = store.enqueue(action_job("bad")).await.unwrap();

  store.mark_succeeded(&ok).await.unwrap();
  store.mark_failed(&bad, "action failed").await.unwrap();

  assert_eq!(store.get_job(&ok).await.unwrap().status, JobStatus::Succeeded);
  let failed = store.get_job(&bad).await.unwrap();
  assert_eq!(failed.status, JobStatus::Failed);
  assert_eq!(failed.error.as_deref(), Some("action failed"));

  assert!(matches!(
    store.mark_failed("nope", "x").await,
    Err(JobError::NotFound(_))
  ));
}

#[tokio::test]
async fn test_recurring_jobs_by_prefix() {
  let store = store().await;
  store.add_or_update(recurring("motor-staging-nightly", "0 2 * * *")).await.unwrap();
  store.add_or_update(recurring("motor-staging-weekly", "0 3 * * 1")).await.unwrap();
  store.add_or_update(recurring("motor-production-nightly", "0 2 * * *")).await.unwrap();

  assert_eq!(
    store.list_ids_with_prefix("motor-staging").await.unwrap(),
    vec!["motor-staging-nightly", "motor-staging-weekly"]
  );

  store.add_or_update(recurring("motor-staging-nightly", "30 2 * * *")).await.unwrap();
  let updated = store.get_recurring("motor-staging-nightly").await.unwrap().unwrap();
  assert_eq!(updated.cron_expression, "30 2 * * *");

  store.remove("motor-staging-weekly").await.unwrap();
  assert_eq!(
    store.list_ids_with_prefix("motor-staging").await.unwrap(),
    vec!["motor-staging-nightly"]
  );
}

#[tokio::test]
async fn test_prefix_is_literal() {
  let store = store().await;
  store.add_or_update(recurring("motor_x-staging-a", "* * * * *")).await.unwrap();
  store.add_or_update(recurring("motorAx-staging-b", "* * * * *")).await.unwrap();
  assert_eq!(
    store.list_ids_with_prefix("motor_x").await.unwrap(),
    vec!["motor_x-staging-a"]
  );
}

#[tokio::test]
async fn test_lock_round_trip() {
  let store = store().await;
  assert!(store.try_acquire("periodic", Duration::from_secs(60)).await.unwrap());
  assert!(!store.try_acquire("periodic", Duration::from_secs(60)).await.unwrap());
  store.release("periodic").await.unwrap();
  assert!(store.try_acquire("periodic", Duration::from_secs(60)).await.unwrap());
}
