use std::sync::LazyLock;

use serde::Deserialize;

use super::{
  IntegerProviderModel, ListProviderModel, NumberProviderModel, ObjectPathLookupModel,
  ObjectProviderModel, TextProviderModel,
};
use crate::registry::{TypeMap, discriminated, variant};

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionProviderModel {
  Static(bool),
  ObjectPathLookup(ObjectPathLookupModel<ConditionProviderModel>),
  TextIsEqualTo(TextEqualityModel),
  TextContains(TextContainsModel),
  IntegerIsGreaterThan(IntegerComparisonModel),
  NumberIsGreaterThan(NumberComparisonModel),
  And(Vec<ConditionProviderModel>),
  Or(Vec<ConditionProviderModel>),
  Not(Box<ConditionProviderModel>),
  ObjectContainsProperty(ObjectContainsPropertyModel),
  ListIsEmpty(Box<ListProviderModel>),
  /// True when the path resolves to a non-null value.
  ValueIsSet(ObjectPathLookupModel<ConditionProviderModel>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEqualityModel {
  pub text: TextProviderModel,
  pub is_equal_to: TextProviderModel,
  #[serde(default)]
  pub ignore_case: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContainsModel {
  pub text: TextProviderModel,
  pub contains: TextProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegerComparisonModel {
  pub integer: IntegerProviderModel,
  pub is_greater_than: IntegerProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberComparisonModel {
  pub number: NumberProviderModel,
  pub is_greater_than: NumberProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectContainsPropertyModel {
  pub object: ObjectProviderModel,
  pub property_name: TextProviderModel,
}

pub static CONDITION_PROVIDERS: LazyLock<TypeMap<ConditionProviderModel>> = LazyLock::new(|| {
  TypeMap::new("condition provider")
    .register("staticCondition", variant!(ConditionProviderModel::Static))
    .register(
      "objectPathLookupCondition",
      variant!(ConditionProviderModel::ObjectPathLookup),
    )
    .register(
      "textIsEqualToCondition",
      variant!(ConditionProviderModel::TextIsEqualTo),
    )
    .register("textContainsCondition", variant!(ConditionProviderModel::TextContains))
    .register(
      "integerIsGreaterThanCondition",
      variant!(ConditionProviderModel::IntegerIsGreaterThan),
    )
    .register(
      "numberIsGreaterThanCondition",
      variant!(ConditionProviderModel::NumberIsGreaterThan),
    )
    .register("andCondition", variant!(ConditionProviderModel::And))
    .register("orCondition", variant!(ConditionProviderModel::Or))
    .register("notCondition", variant!(ConditionProviderModel::Not, boxed))
    .register(
      "objectContainsPropertyCondition",
      variant!(ConditionProviderModel::ObjectContainsProperty),
    )
    .register(
      "listIsEmptyCondition",
      variant!(ConditionProviderModel::ListIsEmpty, boxed),
    )
    .register("valueIsSetCondition", variant!(ConditionProviderModel::ValueIsSet))
    .literal(|value| value.as_bool().map(ConditionProviderModel::Static))
});

discriminated!(ConditionProviderModel, CONDITION_PROVIDERS);
