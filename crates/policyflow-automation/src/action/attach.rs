use std::sync::Arc;

use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::action::AttachFilesToEntityActionModel;

use super::Perform;
use crate::build::{Build, Dependencies};
use crate::data::ActionDetails;
use crate::error::EngineError;
use crate::provider::{BoxProvider, Entity, ProviderContext};
use crate::services::{EntityRepository, FileAttachment};

pub struct AttachFilesToEntity {
  entities: Vec<BoxProvider<Entity>>,
  attachments: Vec<BoxProvider<FileAttachment>>,
  repository: Arc<dyn EntityRepository>,
}

impl Build for AttachFilesToEntityActionModel {
  type Output = AttachFilesToEntity;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(AttachFilesToEntity {
      entities: self.entities.build(deps)?,
      attachments: self.attachments.build(deps)?,
      repository: deps.entities.clone(),
    })
  }
}

#[async_trait]
impl Perform for AttachFilesToEntity {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::AttachFilesToEntity {
      entity_ids: Vec::new(),
      file_names: Vec::new(),
    }
  }

  /// Files and entities that resolve to nothing are skipped.
  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let mut files = Vec::with_capacity(self.attachments.len());
    for file in &self.attachments {
      files.extend(file.resolve(ctx).await?);
    }
    let mut entities = Vec::with_capacity(self.entities.len());
    for entity in &self.entities {
      entities.extend(entity.resolve(ctx).await?);
    }
    *details = ActionDetails::AttachFilesToEntity {
      entity_ids: entities
        .iter()
        .map(|entity| entity.reference.entity_id.clone())
        .collect(),
      file_names: files.iter().map(|file| file.file_name.clone()).collect(),
    };
    for entity in &entities {
      ctx.check_cancelled()?;
      self
        .repository
        .attach_files(&entity.reference, &files)
        .await
        .map_err(EngineError::raised)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use policyflow_config::ActionModel;
  use serde_json::json;

  use super::super::testing::perform;
  use crate::build::{Build, Dependencies};
  use crate::data::ActionDetails;
  use crate::provider;
  use crate::services::InMemoryEntityStore;

  #[tokio::test]
  async fn test_attaches_to_each_entity() {
    let store = InMemoryEntityStore::new();
    store.insert("quote", json!({"id": "q-1"}));
    store.insert("policy", json!({"id": "p-1"}));
    let deps = Dependencies::in_memory().with_entity_store(store.clone());
    let model: ActionModel = serde_json::from_value(json!({"attachFilesToEntitiesAction": {
      "name": "Attach",
      "alias": "attach",
      "entities": [
        {"contextEntity": "quote"},
        {"dynamicEntity": {"entityType": "policy", "entityId": "p-1"}},
        {"contextEntity": "claim"}
      ],
      "attachments": [
        {"textFile": {"outputFileName": "summary.txt", "sourceData": "ok"}}
      ]
    }}))
    .unwrap();
    let (details, result) = perform(&model.build(&deps).unwrap(), &provider::testing::data()).await;
    result.unwrap();

    assert_eq!(
      details,
      ActionDetails::AttachFilesToEntity {
        entity_ids: vec!["q-1".to_string(), "p-1".to_string()],
        file_names: vec!["summary.txt".to_string()],
      }
    );
    assert_eq!(store.attachments("quote", "q-1"), vec!["summary.txt"]);
    assert_eq!(store.attachments("policy", "p-1"), vec!["summary.txt"]);
  }

  #[tokio::test]
  async fn test_unknown_entity_fails() {
    let model: ActionModel = serde_json::from_value(json!({"attachFilesToEntityAction": {
      "name": "Attach",
      "alias": "attach",
      "entities": [{"contextEntity": "quote"}],
      "attachments": []
    }}))
    .unwrap();
    let action = model.build(&Dependencies::in_memory()).unwrap();
    let (_, result) = perform(&action, &provider::testing::data()).await;
    assert_eq!(
      result.unwrap_err().to_error().code,
      "automation.entity.not.found"
    );
  }
}
