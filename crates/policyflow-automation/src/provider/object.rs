use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use policyflow_config::ConfigError;
use policyflow_config::provider::ObjectProviderModel;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::number::decimal_to_value;
use super::patch::{self, PatchOperation};
use super::{BoxProvider, MapProvider, PathLookup, Provider, ProviderContext, StaticProvider};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

impl Build for ObjectProviderModel {
  type Output = BoxProvider<Value>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(value) => Box::new(StaticProvider(value.clone())),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupObject", model, deps)?)
      }
      Self::Dynamic(properties) => Box::new(DynamicObject(
        properties
          .iter()
          .map(|property| {
            Ok::<_, ConfigError>((property.property_name.build(deps)?, property.value.build(deps)?))
          })
          .collect::<Result<_, _>>()?,
      )),
      Self::JsonTextToObject(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        serde_json::from_str(&text)
          .map_err(|e| EngineError::invalid_value("jsonTextToObject", e.to_string()))
      })),
      Self::ContextEntity(name) => Box::new(ContextEntityObject(name.clone())),
      Self::Patch(model) => Box::new(PatchObject {
        source: model.source.build(deps)?,
        operations: model.operations.build(deps)?,
      }),
      Self::Text(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        Ok(Value::String(text))
      })),
      Self::Integer(integer) => Box::new(MapProvider::new(integer.build(deps)?, |i: i64| {
        Ok(Value::from(i))
      })),
      Self::Number(number) => Box::new(MapProvider::new(number.build(deps)?, |n: Decimal| {
        Ok(decimal_to_value(n))
      })),
      Self::Condition(condition) => Box::new(MapProvider::new(condition.build(deps)?, |b: bool| {
        Ok(Value::Bool(b))
      })),
      Self::Date(date) => Box::new(MapProvider::new(date.build(deps)?, |d: NaiveDate| {
        Ok(Value::String(d.to_string()))
      })),
      Self::DateTime(date_time) => Box::new(MapProvider::new(
        date_time.build(deps)?,
        |instant: DateTime<Utc>| Ok(Value::String(instant.to_rfc3339())),
      )),
      Self::List(list) => Box::new(MapProvider::new(list.build(deps)?, |items: Vec<Value>| {
        Ok(Value::Array(items))
      })),
      Self::Expression(expression) => expression.build(deps)?,
    })
  }
}

/// Builds an object property by property. Properties without a value are
/// kept as null.
struct DynamicObject(Vec<(BoxProvider<String>, BoxProvider<Value>)>);

#[async_trait]
impl Provider<Value> for DynamicObject {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Value>, EngineError> {
    let mut object = Map::new();
    for (name, value) in &self.0 {
      let name = name.require(ctx, "propertyName").await?;
      let value = value.resolve(ctx).await?.unwrap_or(Value::Null);
      object.insert(name, value);
    }
    Ok(Some(Value::Object(object)))
  }
}

struct ContextEntityObject(String);

#[async_trait]
impl Provider<Value> for ContextEntityObject {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Value>, EngineError> {
    Ok(ctx.data().context.get(&self.0).cloned())
  }
}

struct PatchObject {
  source: BoxProvider<Value>,
  operations: Vec<PatchOperation>,
}

#[async_trait]
impl Provider<Value> for PatchObject {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Value>, EngineError> {
    let source = self.source.require(ctx, "source").await?;
    patch::apply(&self.operations, source, ctx).await.map(Some)
  }
}
