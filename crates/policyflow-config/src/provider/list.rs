use std::sync::LazyLock;

use serde::Deserialize;

use super::{
  ConditionProviderModel, IntegerProviderModel, ObjectPathLookupModel, ObjectProviderModel,
  default_item_alias,
};
use crate::registry::{TypeMap, discriminated, variant};

#[derive(Debug, Clone, PartialEq)]
pub enum ListProviderModel {
  Static(Vec<serde_json::Value>),
  ObjectPathLookup(ObjectPathLookupModel<ListProviderModel>),
  Filter(FilterListItemsModel),
  Map(MapListItemsModel),
  Range(RangeModel),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterListItemsModel {
  pub list: Box<ListProviderModel>,
  pub condition: FilterProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapListItemsModel {
  pub list: Box<ListProviderModel>,
  #[serde(default = "default_item_alias")]
  pub item_alias: String,
  pub value: ObjectProviderModel,
}

/// Integers from `from` up to and including `to`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeModel {
  pub from: IntegerProviderModel,
  pub to: IntegerProviderModel,
}

pub static LIST_PROVIDERS: LazyLock<TypeMap<ListProviderModel>> = LazyLock::new(|| {
  TypeMap::new("list provider")
    .register("staticList", variant!(ListProviderModel::Static))
    .register("objectPathLookupList", variant!(ListProviderModel::ObjectPathLookup))
    .register("filterListItems", variant!(ListProviderModel::Filter))
    .register("mapListItems", variant!(ListProviderModel::Map))
    .register("range", variant!(ListProviderModel::Range))
    .literal(|value| value.as_array().map(|items| ListProviderModel::Static(items.clone())))
});

discriminated!(ListProviderModel, LIST_PROVIDERS);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConditionModel {
  /// Name the current item is bound under while the condition runs.
  #[serde(default = "default_item_alias")]
  pub item_alias: String,
  pub condition: ConditionProviderModel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterProviderModel {
  Condition(FilterConditionModel),
}

pub static FILTER_PROVIDERS: LazyLock<TypeMap<FilterProviderModel>> = LazyLock::new(|| {
  TypeMap::new("filter provider").register("filterCondition", variant!(FilterProviderModel::Condition))
});

discriminated!(FilterProviderModel, FILTER_PROVIDERS);

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_filter_defaults_item_alias() {
    let model: ListProviderModel = serde_json::from_value(json!({
      "filterListItems": {
        "list": {"objectPathLookupList": "/context/quote/drivers"},
        "condition": {"filterCondition": {
          "condition": {"integerIsGreaterThanCondition": {
            "integer": {"objectPathLookupInteger": "/item/age"},
            "isGreaterThan": 25
          }}
        }}
      }
    }))
    .unwrap();
    let ListProviderModel::Filter(filter) = model else {
      panic!("expected filter");
    };
    let FilterProviderModel::Condition(condition) = filter.condition;
    assert_eq!(condition.item_alias, "item");
  }

  #[test]
  fn test_array_literal() {
    let model: ListProviderModel = serde_json::from_value(json!(["a", 1])).unwrap();
    assert_eq!(model, ListProviderModel::Static(vec![json!("a"), json!(1)]));
  }
}
