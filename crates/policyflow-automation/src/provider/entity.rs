use std::sync::Arc;

use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::provider::EntityProviderModel;
use serde_json::Value;

use super::{BoxProvider, Provider, ProviderContext};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;
use crate::services::{EntityReference, EntityRepository, entity_not_found};

/// An entity together with its current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
  pub reference: EntityReference,
  pub value: Value,
}

impl Build for EntityProviderModel {
  type Output = BoxProvider<Entity>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::ContextEntity(name) => Box::new(ContextEntity(name.clone())),
      Self::Dynamic(model) => Box::new(DynamicEntity {
        entity_type: model.entity_type.build(deps)?,
        entity_id: model.entity_id.build(deps)?,
        repository: deps.entities.clone(),
      }),
    })
  }
}

fn id_of(value: &Value) -> Option<String> {
  match value.get("id")? {
    Value::String(id) => Some(id.clone()),
    Value::Number(id) => Some(id.to_string()),
    _ => None,
  }
}

/// Reads an entity from the `context` section. The context name doubles as
/// the entity type unless the entity carries an `entityType`.
struct ContextEntity(String);

#[async_trait]
impl Provider<Entity> for ContextEntity {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Entity>, EngineError> {
    let Some(value) = ctx.data().context.get(&self.0) else {
      return Ok(None);
    };
    let Some(entity_id) = id_of(value) else {
      return Err(EngineError::invalid_value(
        "contextEntity",
        format!("context entity '{}' has no id", self.0),
      ));
    };
    let entity_type = value
      .get("entityType")
      .and_then(Value::as_str)
      .unwrap_or(&self.0)
      .to_string();
    Ok(Some(Entity {
      reference: EntityReference {
        entity_type,
        entity_id,
      },
      value: value.clone(),
    }))
  }
}

struct DynamicEntity {
  entity_type: BoxProvider<String>,
  entity_id: BoxProvider<String>,
  repository: Arc<dyn EntityRepository>,
}

#[async_trait]
impl Provider<Entity> for DynamicEntity {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Entity>, EngineError> {
    let reference = EntityReference {
      entity_type: self.entity_type.require(ctx, "entityType").await?,
      entity_id: self.entity_id.require(ctx, "entityId").await?,
    };
    match self.repository.get(&reference).await.map_err(EngineError::raised)? {
      Some(value) => Ok(Some(Entity { reference, value })),
      None => Err(EngineError::raised(entity_not_found(&reference))),
    }
  }
}
