use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use policyflow_automation::{AutomationsConfiguration, Dependencies};
use policyflow_config::AutomationsConfigurationModel;
use tokio::fs;
use tracing::{debug, info};

use crate::error::DispatchError;

/// Identifies one deployed configuration version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseContext {
  pub tenant_alias: String,
  pub product_alias: String,
  pub environment: String,
  /// `None` for a deployment without a named release.
  pub product_release_id: Option<String>,
}

impl ReleaseContext {
  pub fn new(
    tenant_alias: impl Into<String>,
    product_alias: impl Into<String>,
    environment: impl Into<String>,
  ) -> Self {
    Self {
      tenant_alias: tenant_alias.into(),
      product_alias: product_alias.into(),
      environment: environment.into(),
      product_release_id: None,
    }
  }

  pub fn with_release(mut self, product_release_id: Option<String>) -> Self {
    self.product_release_id = product_release_id;
    self
  }
}

/// Source of built automation configurations.
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
  /// The release currently deployed to a tenant, product and environment.
  async fn current_release(
    &self,
    tenant_alias: &str,
    product_alias: &str,
    environment: &str,
  ) -> Result<ReleaseContext, DispatchError>;

  /// The built configuration of `release`, or `None` when nothing is
  /// deployed there.
  async fn configuration(
    &self,
    release: &ReleaseContext,
  ) -> Result<Option<Arc<AutomationsConfiguration>>, DispatchError>;

  /// The current release of every deployed tenant, product and environment.
  async fn list(&self) -> Result<Vec<ReleaseContext>, DispatchError>;
}

/// Filesystem-based configuration provider.
///
/// Configurations are stored in a directory structure:
/// ```text
/// {root}/
/// └── acme/
///     └── motor/
///         └── production/
///             ├── automations.json
///             ├── release.txt (optional, current release id)
///             └── releases/ (optional)
///                 └── {releaseId}/automations.json
/// ```
///
/// Built configurations are cached per release; a release is read and
/// built at most once for the life of the provider.
pub struct FsConfigurationProvider {
  root: PathBuf,
  deps: Dependencies,
  cache: RwLock<HashMap<ReleaseContext, Arc<AutomationsConfiguration>>>,
}

impl FsConfigurationProvider {
  pub fn new(root: impl Into<PathBuf>, deps: Dependencies) -> Self {
    Self {
      root: root.into(),
      deps,
      cache: RwLock::new(HashMap::new()),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn environment_dir(&self, tenant_alias: &str, product_alias: &str, environment: &str) -> PathBuf {
    self.root.join(tenant_alias).join(product_alias).join(environment)
  }

  /// Where the automations of `release` live. A named release that is not
  /// the current one is looked up under `releases/`.
  async fn configuration_file(&self, release: &ReleaseContext) -> Result<PathBuf, DispatchError> {
    let dir = self.environment_dir(
      &release.tenant_alias,
      &release.product_alias,
      &release.environment,
    );
    if let Some(release_id) = &release.product_release_id
      && read_release_id(&dir).await?.as_ref() != Some(release_id)
    {
      return Ok(dir.join("releases").join(release_id).join("automations.json"));
    }
    Ok(dir.join("automations.json"))
  }

  /// Drop every cached configuration.
  pub fn clear_cache(&self) {
    self.cache.write().clear();
  }
}

#[async_trait]
impl ConfigurationProvider for FsConfigurationProvider {
  async fn current_release(
    &self,
    tenant_alias: &str,
    product_alias: &str,
    environment: &str,
  ) -> Result<ReleaseContext, DispatchError> {
    let dir = self.environment_dir(tenant_alias, product_alias, environment);
    Ok(
      ReleaseContext::new(tenant_alias, product_alias, environment)
        .with_release(read_release_id(&dir).await?),
    )
  }

  async fn configuration(
    &self,
    release: &ReleaseContext,
  ) -> Result<Option<Arc<AutomationsConfiguration>>, DispatchError> {
    {
      let cache = self.cache.read();
      if let Some(configuration) = cache.get(release) {
        return Ok(Some(configuration.clone()));
      }
    }

    let path = self.configuration_file(release).await?;
    if !fs::try_exists(&path).await? {
      debug!(path = %path.display(), "configuration_not_found");
      return Ok(None);
    }
    let content = fs::read_to_string(&path).await?;
    let model = AutomationsConfigurationModel::from_json(&content)?;
    let configuration = Arc::new(AutomationsConfiguration::build(&model, &self.deps)?);
    info!(
      tenant = %release.tenant_alias,
      product = %release.product_alias,
      environment = %release.environment,
      release = ?release.product_release_id,
      automations = configuration.automations().len(),
      "configuration_loaded"
    );

    let mut cache = self.cache.write();
    Ok(Some(
      cache
        .entry(release.clone())
        .or_insert(configuration)
        .clone(),
    ))
  }

  async fn list(&self) -> Result<Vec<ReleaseContext>, DispatchError> {
    let mut releases = Vec::new();
    if !fs::try_exists(&self.root).await? {
      return Ok(releases);
    }

    for tenant in sub_dirs(&self.root).await? {
      for product in sub_dirs(&self.root.join(&tenant)).await? {
        for environment in sub_dirs(&self.root.join(&tenant).join(&product)).await? {
          let dir = self.environment_dir(&tenant, &product, &environment);
          if fs::try_exists(dir.join("automations.json")).await? {
            releases.push(self.current_release(&tenant, &product, &environment).await?);
          }
        }
      }
    }
    releases.sort_by(|a, b| {
      (&a.tenant_alias, &a.product_alias, &a.environment).cmp(&(
        &b.tenant_alias,
        &b.product_alias,
        &b.environment,
      ))
    });
    Ok(releases)
  }
}

async fn read_release_id(dir: &Path) -> Result<Option<String>, DispatchError> {
  let path = dir.join("release.txt");
  if !fs::try_exists(&path).await? {
    return Ok(None);
  }
  let release_id = fs::read_to_string(&path).await?.trim().to_string();
  Ok((!release_id.is_empty()).then_some(release_id))
}

/// Names of the directories directly under `dir`.
async fn sub_dirs(dir: &Path) -> Result<Vec<String>, std::io::Error> {
  let mut names = Vec::new();
  let mut entries = fs::read_dir(dir).await?;
  while let Some(entry) = entries.next_entry().await? {
    if !entry.file_type().await?.is_dir() {
      continue;
    }
    if let Some(name) = entry.file_name().to_str() {
      names.push(name.to_string());
    }
  }
  Ok(names)
}
