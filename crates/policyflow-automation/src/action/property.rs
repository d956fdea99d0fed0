use std::sync::Arc;

use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::action::{
  IncrementAdditionalPropertyValueActionModel, SetAdditionalPropertyValueActionModel,
};
use serde_json::Value;

use super::Perform;
use crate::build::{Build, Dependencies};
use crate::data::{ActionDetails, PropertyUpdate};
use crate::error::EngineError;
use crate::provider::{BoxProvider, Entity, LookupValue, ProviderContext, resolve_optional};
use crate::services::EntityRepository;

fn update(entity: &Entity, property_alias: &str, value: Option<Value>) -> PropertyUpdate {
  PropertyUpdate {
    entity_type: Some(entity.reference.entity_type.clone()),
    entity_id: Some(entity.reference.entity_id.clone()),
    property_alias: Some(property_alias.to_string()),
    value,
  }
}

pub struct SetAdditionalPropertyValue {
  entity: BoxProvider<Entity>,
  property_alias: BoxProvider<String>,
  value: BoxProvider<String>,
  repository: Arc<dyn EntityRepository>,
}

impl Build for SetAdditionalPropertyValueActionModel {
  type Output = SetAdditionalPropertyValue;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(SetAdditionalPropertyValue {
      entity: self.entity.build(deps)?,
      property_alias: self.property_alias.build(deps)?,
      value: self.value.build(deps)?,
      repository: deps.entities.clone(),
    })
  }
}

#[async_trait]
impl Perform for SetAdditionalPropertyValue {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::SetAdditionalPropertyValue(PropertyUpdate::default())
  }

  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let entity = self.entity.require(ctx, "entity").await?;
    let property_alias = self.property_alias.require(ctx, "propertyAlias").await?;
    let value = Value::String(self.value.require(ctx, "value").await?);
    let recorded = update(&entity, &property_alias, Some(value.clone()));
    *details = ActionDetails::SetAdditionalPropertyValue(recorded);
    self
      .repository
      .set_additional_property_value(&entity.reference, &property_alias, value)
      .await
      .map_err(EngineError::raised)
  }
}

pub struct IncrementAdditionalPropertyValue {
  entity: BoxProvider<Entity>,
  property_alias: BoxProvider<String>,
  increment: Option<BoxProvider<i64>>,
  repository: Arc<dyn EntityRepository>,
}

impl Build for IncrementAdditionalPropertyValueActionModel {
  type Output = IncrementAdditionalPropertyValue;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(IncrementAdditionalPropertyValue {
      entity: self.entity.build(deps)?,
      property_alias: self.property_alias.build(deps)?,
      increment: self.increment.build(deps)?,
      repository: deps.entities.clone(),
    })
  }
}

#[async_trait]
impl Perform for IncrementAdditionalPropertyValue {
  fn initial_details(&self) -> ActionDetails {
    ActionDetails::IncrementAdditionalPropertyValue(PropertyUpdate::default())
  }

  /// An unset or empty property counts as zero.
  async fn perform(
    &self,
    ctx: &ProviderContext<'_>,
    details: &mut ActionDetails,
  ) -> Result<(), EngineError> {
    let entity = self.entity.require(ctx, "entity").await?;
    let property_alias = self.property_alias.require(ctx, "propertyAlias").await?;
    let increment = resolve_optional(&self.increment, ctx).await?.unwrap_or(1);

    let current = self
      .repository
      .get_additional_property_value(&entity.reference, &property_alias)
      .await
      .map_err(EngineError::raised)?;
    let current = match current {
      None | Some(Value::Null) => 0,
      Some(Value::String(text)) if text.trim().is_empty() => 0,
      Some(value) => i64::from_json(&value).ok_or_else(|| {
        EngineError::invalid_value(
          "incrementAdditionalPropertyValueAction",
          format!("'{}' holds {}, which is not an integer", property_alias, value),
        )
      })?,
    };
    let next = current.checked_add(increment).ok_or_else(|| {
      EngineError::invalid_value(
        "incrementAdditionalPropertyValueAction",
        format!("incrementing '{}' overflows", property_alias),
      )
    })?;

    *details = ActionDetails::IncrementAdditionalPropertyValue(update(
      &entity,
      &property_alias,
      Some(Value::from(next)),
    ));
    self
      .repository
      .set_additional_property_value(&entity.reference, &property_alias, Value::from(next))
      .await
      .map_err(EngineError::raised)
  }
}

#[cfg(test)]
mod tests {
  use policyflow_config::ActionModel;
  use serde_json::json;

  use super::super::testing::perform;
  use crate::build::{Build, Dependencies};
  use crate::provider;
  use crate::services::InMemoryEntityStore;

  fn store() -> InMemoryEntityStore {
    let store = InMemoryEntityStore::new();
    store.insert(
      "quote",
      json!({"id": "q-1", "additionalProperties": {"reminders": "2", "note": "x"}}),
    );
    store
  }

  #[tokio::test]
  async fn test_set_then_increment() {
    let store = store();
    let deps = Dependencies::in_memory().with_entity_store(store.clone());

    let set: ActionModel = serde_json::from_value(json!({"setAdditionalPropertyValueAction": {
      "name": "Set",
      "alias": "set",
      "entity": {"contextEntity": "quote"},
      "propertyAlias": "channel",
      "value": "web"
    }}))
    .unwrap();
    let (_, result) = perform(&set.build(&deps).unwrap(), &provider::testing::data()).await;
    result.unwrap();

    let increment: ActionModel =
      serde_json::from_value(json!({"incrementAdditionalPropertyValueAction": {
        "name": "Bump",
        "alias": "bump",
        "entity": {"contextEntity": "quote"},
        "propertyAlias": "reminders",
        "increment": 3
      }}))
      .unwrap();
    let (details, result) =
      perform(&increment.build(&deps).unwrap(), &provider::testing::data()).await;
    result.unwrap();
    assert_eq!(serde_json::to_value(&details).unwrap()["value"], json!(5));

    let quote = store.entity("quote", "q-1").unwrap();
    assert_eq!(quote["additionalProperties"]["channel"], json!("web"));
    assert_eq!(quote["additionalProperties"]["reminders"], json!(5));
  }

  #[tokio::test]
  async fn test_increment_rejects_text() {
    let deps = Dependencies::in_memory().with_entity_store(store());
    let increment: ActionModel =
      serde_json::from_value(json!({"incrementAdditionalPropertyValueAction": {
        "name": "Bump",
        "alias": "bump",
        "entity": {"contextEntity": "quote"},
        "propertyAlias": "note"
      }}))
      .unwrap();
    let (_, result) = perform(&increment.build(&deps).unwrap(), &provider::testing::data()).await;
    assert_eq!(
      result.unwrap_err().to_error().code,
      "automation.provider.invalid.value"
    );
  }
}
