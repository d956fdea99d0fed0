use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::provider::ConditionProviderModel;
use rust_decimal::Decimal;
use serde_json::Value;

use super::{BoxProvider, PathLookup, Provider, ProviderContext, StaticProvider};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

impl Build for ConditionProviderModel {
  type Output = BoxProvider<bool>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(value) => Box::new(StaticProvider(*value)),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupCondition", model, deps)?)
      }
      Self::TextIsEqualTo(model) => Box::new(TextIsEqualTo {
        text: model.text.build(deps)?,
        is_equal_to: model.is_equal_to.build(deps)?,
        ignore_case: model.ignore_case,
      }),
      Self::TextContains(model) => Box::new(TextContains {
        text: model.text.build(deps)?,
        contains: model.contains.build(deps)?,
      }),
      Self::IntegerIsGreaterThan(model) => Box::new(IsGreaterThan {
        name: "integerIsGreaterThanCondition",
        value: model.integer.build(deps)?,
        threshold: model.is_greater_than.build(deps)?,
      }),
      Self::NumberIsGreaterThan(model) => Box::new(IsGreaterThan::<Decimal> {
        name: "numberIsGreaterThanCondition",
        value: model.number.build(deps)?,
        threshold: model.is_greater_than.build(deps)?,
      }),
      Self::And(conditions) => Box::new(All(conditions.build(deps)?)),
      Self::Or(conditions) => Box::new(Any(conditions.build(deps)?)),
      Self::Not(condition) => Box::new(Not(condition.build(deps)?)),
      Self::ObjectContainsProperty(model) => Box::new(ObjectContainsProperty {
        object: model.object.build(deps)?,
        property_name: model.property_name.build(deps)?,
      }),
      Self::ListIsEmpty(list) => Box::new(ListIsEmpty(list.build(deps)?)),
      Self::ValueIsSet(model) => Box::new(ValueIsSet(PathLookup::lenient(
        "valueIsSetCondition",
        &model.path,
        model.data_object.as_deref(),
        deps,
      )?)),
    })
  }
}

struct TextIsEqualTo {
  text: BoxProvider<String>,
  is_equal_to: BoxProvider<String>,
  ignore_case: bool,
}

#[async_trait]
impl Provider<bool> for TextIsEqualTo {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    let text = self.text.resolve(ctx).await?;
    let other = self.is_equal_to.resolve(ctx).await?;
    let equal = match (text, other) {
      (Some(a), Some(b)) if self.ignore_case => a.to_lowercase() == b.to_lowercase(),
      (a, b) => a == b,
    };
    Ok(Some(equal))
  }
}

struct TextContains {
  text: BoxProvider<String>,
  contains: BoxProvider<String>,
}

#[async_trait]
impl Provider<bool> for TextContains {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    let Some(text) = self.text.resolve(ctx).await? else {
      return Ok(Some(false));
    };
    let needle = self.contains.require(ctx, "textContainsCondition").await?;
    Ok(Some(text.contains(&needle)))
  }
}

struct IsGreaterThan<T> {
  name: &'static str,
  value: BoxProvider<T>,
  threshold: BoxProvider<T>,
}

#[async_trait]
impl<T: PartialOrd + Send + Sync + 'static> Provider<bool> for IsGreaterThan<T> {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    let value = self.value.require(ctx, self.name).await?;
    let threshold = self.threshold.require(ctx, self.name).await?;
    Ok(Some(value > threshold))
  }
}

/// Short-circuits on the first false operand. Absent operands count as false.
struct All(Vec<BoxProvider<bool>>);

#[async_trait]
impl Provider<bool> for All {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    for condition in &self.0 {
      if !condition.resolve(ctx).await?.unwrap_or(false) {
        return Ok(Some(false));
      }
    }
    Ok(Some(true))
  }
}

struct Any(Vec<BoxProvider<bool>>);

#[async_trait]
impl Provider<bool> for Any {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    for condition in &self.0 {
      if condition.resolve(ctx).await?.unwrap_or(false) {
        return Ok(Some(true));
      }
    }
    Ok(Some(false))
  }
}

struct Not(BoxProvider<bool>);

#[async_trait]
impl Provider<bool> for Not {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    Ok(Some(!self.0.resolve(ctx).await?.unwrap_or(false)))
  }
}

struct ObjectContainsProperty {
  object: BoxProvider<Value>,
  property_name: BoxProvider<String>,
}

#[async_trait]
impl Provider<bool> for ObjectContainsProperty {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    let name = self
      .property_name
      .require(ctx, "objectContainsPropertyCondition")
      .await?;
    let contains = matches!(
      self.object.resolve(ctx).await?,
      Some(Value::Object(map)) if map.contains_key(&name)
    );
    Ok(Some(contains))
  }
}

struct ListIsEmpty(BoxProvider<Vec<Value>>);

#[async_trait]
impl Provider<bool> for ListIsEmpty {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    let items = self.0.resolve(ctx).await?;
    Ok(Some(items.is_none_or(|items| items.is_empty())))
  }
}

/// True when the path resolves to a non-null value.
struct ValueIsSet(PathLookup<Value>);

#[async_trait]
impl Provider<bool> for ValueIsSet {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<bool>, EngineError> {
    Ok(Some(self.0.resolve(ctx).await?.is_some()))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tokio_util::sync::CancellationToken;

  use super::super::testing;
  use super::*;

  async fn check(model: Value) -> bool {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let provider = testing::build::<ConditionProviderModel>(model);
    provider
      .resolve(&ProviderContext::new(&data, &cancel))
      .await
      .unwrap()
      .unwrap()
  }

  #[tokio::test]
  async fn test_text_comparisons() {
    assert!(
      check(json!({"textIsEqualToCondition": {
        "text": {"objectPathLookupText": "/context/quote/quoteNumber"},
        "isEqualTo": "q-0001",
        "ignoreCase": true
      }}))
      .await
    );
    assert!(
      !check(json!({"textIsEqualToCondition": {
        "text": {"objectPathLookupText": "/context/quote/quoteNumber"},
        "isEqualTo": "q-0001"
      }}))
      .await
    );
    assert!(
      check(json!({"textContainsCondition": {
        "text": {"objectPathLookupText": "/context/quote/quoteNumber"},
        "contains": "0001"
      }}))
      .await
    );
  }

  #[tokio::test]
  async fn test_boolean_logic_short_circuits() {
    // The second operand would raise if evaluated.
    assert!(
      !check(json!({"andCondition": [
        false,
        {"objectPathLookupCondition": "/context/missing"}
      ]}))
      .await
    );
    assert!(
      check(json!({"orCondition": [
        true,
        {"objectPathLookupCondition": "/context/missing"}
      ]}))
      .await
    );
    assert!(check(json!({"notCondition": false})).await);
  }

  #[tokio::test]
  async fn test_comparisons() {
    assert!(
      check(json!({"numberIsGreaterThanCondition": {
        "number": {"objectPathLookupNumber": "/context/quote/premium"},
        "isGreaterThan": 100
      }}))
      .await
    );
    assert!(
      !check(json!({"integerIsGreaterThanCondition": {
        "integer": {"countListItems": {"objectPathLookupList": "/context/quote/drivers"}},
        "isGreaterThan": 2
      }}))
      .await
    );
  }

  #[tokio::test]
  async fn test_presence_checks() {
    assert!(check(json!({"valueIsSetCondition": "/context/quote/quoteNumber"})).await);
    assert!(!check(json!({"valueIsSetCondition": "/context/quote/customer"})).await);
    assert!(!check(json!({"valueIsSetCondition": "/context/policy"})).await);
    assert!(
      check(json!({"objectContainsPropertyCondition": {
        "object": {"contextEntityObject": "quote"},
        "propertyName": "premium"
      }}))
      .await
    );
    assert!(check(json!({"listIsEmptyCondition": []})).await);
  }
}
