use std::str::FromStr;

use async_trait::async_trait;
use policyflow_config::ConfigError;
use policyflow_config::provider::{IntegerProviderModel, NumberProviderModel};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use super::{BoxProvider, MapProvider, PathLookup, Provider, ProviderContext, StaticProvider};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

/// JSON form of a decimal: an integer when it has no fraction.
pub(crate) fn decimal_to_value(number: Decimal) -> Value {
  let number = number.normalize();
  if number.scale() == 0
    && let Some(integer) = number.to_i64()
  {
    return Value::from(integer);
  }
  number
    .to_f64()
    .and_then(serde_json::Number::from_f64)
    .map(Value::Number)
    .unwrap_or_else(|| Value::String(number.to_string()))
}

fn parse_integer(text: String) -> Result<i64, EngineError> {
  text.trim().parse().map_err(|_| {
    EngineError::invalid_value("textToInteger", format!("'{}' is not an integer", text))
  })
}

fn parse_number(text: String) -> Result<Decimal, EngineError> {
  let trimmed = text.trim();
  Decimal::from_str(trimmed)
    .or_else(|_| Decimal::from_scientific(trimmed))
    .map_err(|_| EngineError::invalid_value("textToNumber", format!("'{}' is not a number", text)))
}

impl Build for IntegerProviderModel {
  type Output = BoxProvider<i64>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(integer) => Box::new(StaticProvider(*integer)),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupInteger", model, deps)?)
      }
      Self::TextToInteger(text) => Box::new(MapProvider::new(text.build(deps)?, parse_integer)),
      Self::CountListItems(list) => Box::new(MapProvider::new(list.build(deps)?, |items: Vec<Value>| {
        Ok(items.len() as i64)
      })),
      Self::Add(terms) => Box::new(AddIntegers(terms.build(deps)?)),
    })
  }
}

impl Build for NumberProviderModel {
  type Output = BoxProvider<Decimal>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(number) => Box::new(StaticProvider(*number)),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupNumber", model, deps)?)
      }
      Self::TextToNumber(text) => Box::new(MapProvider::new(text.build(deps)?, parse_number)),
      Self::IntegerToNumber(integer) => Box::new(MapProvider::new(integer.build(deps)?, |i: i64| {
        Ok(Decimal::from(i))
      })),
      Self::Sum(terms) => Box::new(SumNumbers(terms.build(deps)?)),
    })
  }
}

struct AddIntegers(Vec<BoxProvider<i64>>);

#[async_trait]
impl Provider<i64> for AddIntegers {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<i64>, EngineError> {
    let mut total: i64 = 0;
    for term in &self.0 {
      let term = term.require(ctx, "addIntegers").await?;
      total = total
        .checked_add(term)
        .ok_or_else(|| EngineError::invalid_value("addIntegers", "integer overflow"))?;
    }
    Ok(Some(total))
  }
}

struct SumNumbers(Vec<BoxProvider<Decimal>>);

#[async_trait]
impl Provider<Decimal> for SumNumbers {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Decimal>, EngineError> {
    let mut total = Decimal::ZERO;
    for term in &self.0 {
      let term = term.require(ctx, "sumNumbers").await?;
      total = total
        .checked_add(term)
        .ok_or_else(|| EngineError::invalid_value("sumNumbers", "number overflow"))?;
    }
    Ok(Some(total))
  }
}
