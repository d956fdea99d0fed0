use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use policyflow_automation::DEFAULT_QUEUE;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::DispatchError;

/// Settings for the dispatch services.
///
/// Read from `settings.json` in the data directory; every field is optional
/// there and falls back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchSettings {
  /// Directory holding `{tenant}/{product}/{environment}/automations.json`.
  /// Relative paths are resolved against the data directory.
  pub configuration_root: PathBuf,
  /// Queue partition automation jobs are pushed onto.
  pub automation_queue: String,
  /// How long a periodic registration sweep may hold its lock.
  #[serde(with = "seconds")]
  pub periodic_lock_timeout: Duration,
  /// Product hosting tenant level automations, for events that carry no
  /// product of their own. Keyed by tenant alias.
  pub tenant_fallback_products: HashMap<String, String>,
}

impl Default for DispatchSettings {
  fn default() -> Self {
    Self {
      configuration_root: PathBuf::from("configurations"),
      automation_queue: DEFAULT_QUEUE.to_string(),
      periodic_lock_timeout: Duration::from_secs(30),
      tenant_fallback_products: HashMap::new(),
    }
  }
}

impl DispatchSettings {
  /// Load `settings.json` from `data_dir`, or the defaults when it is absent.
  pub async fn load(data_dir: &Path) -> Result<Self, DispatchError> {
    let path = data_dir.join("settings.json");
    let mut settings = if fs::try_exists(&path).await? {
      let content = fs::read_to_string(&path).await?;
      serde_json::from_str::<Self>(&content).map_err(DispatchError::Settings)?
    } else {
      Self::default()
    };
    if settings.configuration_root.is_relative() {
      settings.configuration_root = data_dir.join(&settings.configuration_root);
    }
    Ok(settings)
  }

  pub fn fallback_product(&self, tenant_alias: &str) -> Option<&str> {
    self
      .tenant_fallback_products
      .get(tenant_alias)
      .map(String::as_str)
  }
}

mod seconds {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = DispatchSettings::load(dir.path()).await.unwrap();
    assert_eq!(settings.automation_queue, DEFAULT_QUEUE);
    assert_eq!(settings.configuration_root, dir.path().join("configurations"));
    assert_eq!(settings.periodic_lock_timeout, Duration::from_secs(30));
  }

  #[tokio::test]
  async fn test_partial_file_overrides() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
      dir.path().join("settings.json"),
      r#"{"periodicLockTimeout": 5, "tenantFallbackProducts": {"legacy": "tenantHost"}}"#,
    )
    .await
    .unwrap();

    let settings = DispatchSettings::load(dir.path()).await.unwrap();
    assert_eq!(settings.periodic_lock_timeout, Duration::from_secs(5));
    assert_eq!(settings.fallback_product("legacy"), Some("tenantHost"));
    assert_eq!(settings.fallback_product("acme"), None);
    assert_eq!(settings.automation_queue, DEFAULT_QUEUE);
  }

  #[tokio::test]
  async fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("settings.json"), "{").await.unwrap();
    let result = DispatchSettings::load(dir.path()).await;
    assert!(matches!(result, Err(DispatchError::Settings(_))));
  }
}
