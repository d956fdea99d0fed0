use std::sync::LazyLock;

use serde::Deserialize;

use super::TextProviderModel;
use crate::registry::{TypeMap, discriminated, variant};

#[derive(Debug, Clone, PartialEq)]
pub enum EntityProviderModel {
  /// Entity already loaded into the automation data's `context` section,
  /// e.g. `"quote"` or `"policy"`.
  ContextEntity(String),
  /// Entity loaded by type and id through the entity repository.
  Dynamic(DynamicEntityModel),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicEntityModel {
  pub entity_type: TextProviderModel,
  pub entity_id: TextProviderModel,
}

pub static ENTITY_PROVIDERS: LazyLock<TypeMap<EntityProviderModel>> = LazyLock::new(|| {
  TypeMap::new("entity provider")
    .register("contextEntity", variant!(EntityProviderModel::ContextEntity))
    .register("dynamicEntity", variant!(EntityProviderModel::Dynamic))
});

discriminated!(EntityProviderModel, ENTITY_PROVIDERS);
