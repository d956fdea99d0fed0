use std::str::FromStr;
use std::sync::LazyLock;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde_json::Value;

use super::{ListProviderModel, ObjectPathLookupModel, TextProviderModel};
use crate::registry::{TypeMap, discriminated, variant};

#[derive(Debug, Clone, PartialEq)]
pub enum IntegerProviderModel {
  Static(i64),
  ObjectPathLookup(ObjectPathLookupModel<IntegerProviderModel>),
  TextToInteger(Box<TextProviderModel>),
  CountListItems(Box<ListProviderModel>),
  Add(Vec<IntegerProviderModel>),
}

pub static INTEGER_PROVIDERS: LazyLock<TypeMap<IntegerProviderModel>> = LazyLock::new(|| {
  TypeMap::new("integer provider")
    .register("staticInteger", variant!(IntegerProviderModel::Static))
    .register(
      "objectPathLookupInteger",
      variant!(IntegerProviderModel::ObjectPathLookup),
    )
    .register("textToInteger", variant!(IntegerProviderModel::TextToInteger, boxed))
    // Deprecated name kept for existing configurations.
    .register("parseTextInteger", variant!(IntegerProviderModel::TextToInteger, boxed))
    .register("countListItems", variant!(IntegerProviderModel::CountListItems, boxed))
    .register("addIntegers", variant!(IntegerProviderModel::Add))
    .literal(|value| value.as_i64().map(IntegerProviderModel::Static))
});

discriminated!(IntegerProviderModel, INTEGER_PROVIDERS);

#[derive(Debug, Clone, PartialEq)]
pub enum NumberProviderModel {
  Static(Decimal),
  ObjectPathLookup(ObjectPathLookupModel<NumberProviderModel>),
  TextToNumber(Box<TextProviderModel>),
  IntegerToNumber(Box<IntegerProviderModel>),
  Sum(Vec<NumberProviderModel>),
}

/// Widen a JSON number (or numeric text) to a decimal without going through f64.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
  match value {
    Value::Number(n) => Decimal::from_str(&n.to_string())
      .or_else(|_| Decimal::from_scientific(&n.to_string()))
      .ok(),
    Value::String(s) => Decimal::from_str(s.trim()).ok(),
    _ => None,
  }
}

pub static NUMBER_PROVIDERS: LazyLock<TypeMap<NumberProviderModel>> = LazyLock::new(|| {
  TypeMap::new("number provider")
    .register("staticNumber", |body| {
      decimal_from_value(&body)
        .map(NumberProviderModel::Static)
        .ok_or_else(|| serde_json::Error::custom(format!("expected a number, found {}", body)))
    })
    .register("objectPathLookupNumber", variant!(NumberProviderModel::ObjectPathLookup))
    .register("textToNumber", variant!(NumberProviderModel::TextToNumber, boxed))
    .register("integerToNumber", variant!(NumberProviderModel::IntegerToNumber, boxed))
    .register("sumNumbers", variant!(NumberProviderModel::Sum))
    .literal(|value| match value {
      Value::Number(_) => decimal_from_value(value).map(NumberProviderModel::Static),
      _ => None,
    })
});

discriminated!(NumberProviderModel, NUMBER_PROVIDERS);
