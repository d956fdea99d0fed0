use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::provider::{FilterProviderModel, ListProviderModel};
use serde_json::Value;

use super::{BoxProvider, PathLookup, Provider, ProviderContext, StaticProvider};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

/// Upper bound on the number of items a `range` may produce.
const MAX_RANGE_LENGTH: i64 = 100_000;

/// A condition evaluated once per list item, with the item bound under
/// `item_alias`.
pub struct FilterCondition {
  pub item_alias: String,
  pub condition: BoxProvider<bool>,
}

impl FilterCondition {
  pub async fn matches(&self, item: &Value, ctx: &ProviderContext<'_>) -> Result<bool, EngineError> {
    let scoped = ctx.with_variable(self.item_alias.clone(), item.clone());
    Ok(self.condition.resolve(&scoped).await?.unwrap_or(false))
  }
}

impl Build for FilterProviderModel {
  type Output = FilterCondition;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    match self {
      Self::Condition(model) => Ok(FilterCondition {
        item_alias: model.item_alias.clone(),
        condition: model.condition.build(deps)?,
      }),
    }
  }
}

impl Build for ListProviderModel {
  type Output = BoxProvider<Vec<Value>>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(items) => Box::new(StaticProvider(items.clone())),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupList", model, deps)?)
      }
      Self::Filter(model) => Box::new(FilterItems {
        list: model.list.build(deps)?,
        filter: model.condition.build(deps)?,
      }),
      Self::Map(model) => Box::new(MapItems {
        list: model.list.build(deps)?,
        item_alias: model.item_alias.clone(),
        value: model.value.build(deps)?,
      }),
      Self::Range(model) => Box::new(Range {
        from: model.from.build(deps)?,
        to: model.to.build(deps)?,
      }),
    })
  }
}

struct FilterItems {
  list: BoxProvider<Vec<Value>>,
  filter: FilterCondition,
}

#[async_trait]
impl Provider<Vec<Value>> for FilterItems {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Vec<Value>>, EngineError> {
    let Some(items) = self.list.resolve(ctx).await? else {
      return Ok(None);
    };
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
      ctx.check_cancelled()?;
      if self.filter.matches(&item, ctx).await? {
        kept.push(item);
      }
    }
    Ok(Some(kept))
  }
}

struct MapItems {
  list: BoxProvider<Vec<Value>>,
  item_alias: String,
  value: BoxProvider<Value>,
}

#[async_trait]
impl Provider<Vec<Value>> for MapItems {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Vec<Value>>, EngineError> {
    let Some(items) = self.list.resolve(ctx).await? else {
      return Ok(None);
    };
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
      ctx.check_cancelled()?;
      let scoped = ctx.with_variable(self.item_alias.clone(), item);
      mapped.push(self.value.resolve(&scoped).await?.unwrap_or(Value::Null));
    }
    Ok(Some(mapped))
  }
}

struct Range {
  from: BoxProvider<i64>,
  to: BoxProvider<i64>,
}

#[async_trait]
impl Provider<Vec<Value>> for Range {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Vec<Value>>, EngineError> {
    let from = self.from.require(ctx, "from").await?;
    let to = self.to.require(ctx, "to").await?;
    if to < from {
      return Ok(Some(Vec::new()));
    }
    if to.saturating_sub(from) >= MAX_RANGE_LENGTH {
      return Err(EngineError::invalid_value(
        "range",
        format!("a range may hold at most {} items", MAX_RANGE_LENGTH),
      ));
    }
    Ok(Some((from..=to).map(Value::from).collect()))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tokio_util::sync::CancellationToken;

  use super::super::testing;
  use super::*;

  async fn resolve(model: Value) -> Option<Vec<Value>> {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let provider = testing::build::<ListProviderModel>(model);
    provider
      .resolve(&ProviderContext::new(&data, &cancel))
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_filter_binds_item() {
    let adults = resolve(json!({"filterListItems": {
      "list": {"objectPathLookupList": "/context/quote/drivers"},
      "condition": {"filterCondition": {
        "itemAlias": "driver",
        "condition": {"integerIsGreaterThanCondition": {
          "integer": {"objectPathLookupInteger": "/driver/age"},
          "isGreaterThan": 21
        }}
      }}
    }}))
    .await;
    assert_eq!(adults, Some(vec![json!({"name": "Ann", "age": 34})]));
  }

  #[tokio::test]
  async fn test_map_items() {
    let names = resolve(json!({"mapListItems": {
      "list": {"objectPathLookupList": "/context/quote/drivers"},
      "value": {"objectPathLookupText": "/item/name"}
    }}))
    .await;
    assert_eq!(names, Some(vec![json!("Ann"), json!("Bob")]));
  }

  #[tokio::test]
  async fn test_range_is_inclusive() {
    assert_eq!(
      resolve(json!({"range": {"from": 1, "to": 3}})).await,
      Some(vec![json!(1), json!(2), json!(3)])
    );
    assert_eq!(resolve(json!({"range": {"from": 3, "to": 1}})).await, Some(vec![]));
  }
}
