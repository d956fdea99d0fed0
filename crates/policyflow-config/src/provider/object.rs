use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::Value;

use super::{
  CONDITION_PROVIDERS, ConditionProviderModel, DATE_PROVIDERS, DATE_TIME_PROVIDERS,
  DateProviderModel, DateTimeProviderModel, EXPRESSION_PROVIDERS, ExpressionProviderModel,
  INTEGER_PROVIDERS, IntegerProviderModel, LIST_PROVIDERS, ListProviderModel, NUMBER_PROVIDERS,
  NumberProviderModel, ObjectPathLookupModel, TEXT_PROVIDERS, TextProviderModel,
};
use crate::registry::{TypeMap, discriminated, variant};

/// Anything that resolves to a JSON value.
///
/// Besides its own keys, this category accepts every text, integer, number,
/// condition, date, date-time, list and expression provider, so
/// `dynamicObject` properties can be typed by whatever provider the author
/// reaches for.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProviderModel {
  Static(Value),
  ObjectPathLookup(ObjectPathLookupModel<ObjectProviderModel>),
  Dynamic(Vec<ObjectPropertyModel>),
  JsonTextToObject(Box<TextProviderModel>),
  /// A named entry of the automation data's `context` section.
  ContextEntity(String),
  Patch(PatchObjectModel),
  Text(Box<TextProviderModel>),
  Integer(Box<IntegerProviderModel>),
  Number(Box<NumberProviderModel>),
  Condition(Box<ConditionProviderModel>),
  Date(Box<DateProviderModel>),
  DateTime(Box<DateTimeProviderModel>),
  List(Box<ListProviderModel>),
  Expression(Box<ExpressionProviderModel>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPropertyModel {
  pub property_name: TextProviderModel,
  pub value: ObjectProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchObjectModel {
  pub source: Box<ObjectProviderModel>,
  pub operations: Vec<PatchOperationModel>,
}

macro_rules! adopt {
  ($key:expr, $body:expr, $( $registry:ident => $variant:path ),* $(,)?) => {
    $(
      if $registry.contains($key) {
        return $registry
          .construct($key, $body)
          .map(|result| result.map(|model| $variant(Box::new(model))));
      }
    )*
  };
}

fn other_category(key: &str, body: Value) -> Option<Result<ObjectProviderModel, serde_json::Error>> {
  adopt!(
    key,
    body,
    TEXT_PROVIDERS => ObjectProviderModel::Text,
    INTEGER_PROVIDERS => ObjectProviderModel::Integer,
    NUMBER_PROVIDERS => ObjectProviderModel::Number,
    CONDITION_PROVIDERS => ObjectProviderModel::Condition,
    DATE_PROVIDERS => ObjectProviderModel::Date,
    DATE_TIME_PROVIDERS => ObjectProviderModel::DateTime,
    LIST_PROVIDERS => ObjectProviderModel::List,
    EXPRESSION_PROVIDERS => ObjectProviderModel::Expression,
  );
  None
}

pub static OBJECT_PROVIDERS: LazyLock<TypeMap<ObjectProviderModel>> = LazyLock::new(|| {
  TypeMap::new("object provider")
    .register("staticObject", variant!(ObjectProviderModel::Static))
    .register("objectPathLookupObject", variant!(ObjectProviderModel::ObjectPathLookup))
    .register("dynamicObject", variant!(ObjectProviderModel::Dynamic))
    .register("jsonTextToObject", variant!(ObjectProviderModel::JsonTextToObject, boxed))
    .register("contextEntityObject", variant!(ObjectProviderModel::ContextEntity))
    .register("patchObject", variant!(ObjectProviderModel::Patch))
    .literal(|value| Some(ObjectProviderModel::Static(value.clone())))
    .fallback(other_category)
});

discriminated!(ObjectProviderModel, OBJECT_PROVIDERS);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchValueModel {
  pub path: String,
  pub value: ObjectProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPathModel {
  pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchMoveModel {
  pub from: String,
  pub path: String,
}

/// One JSON-patch style edit. Paths are object pointers into the patched
/// object.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOperationModel {
  Add(PatchValueModel),
  Replace(PatchValueModel),
  Remove(PatchPathModel),
  Copy(PatchMoveModel),
  Move(PatchMoveModel),
}

pub static PATCH_OPERATIONS: LazyLock<TypeMap<PatchOperationModel>> = LazyLock::new(|| {
  TypeMap::new("patch operation")
    .register("add", variant!(PatchOperationModel::Add))
    .register("replace", variant!(PatchOperationModel::Replace))
    .register("remove", variant!(PatchOperationModel::Remove))
    .register("copy", variant!(PatchOperationModel::Copy))
    .register("move", variant!(PatchOperationModel::Move))
});

discriminated!(PatchOperationModel, PATCH_OPERATIONS);

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_scalars_and_arrays_are_static() {
    let model: ObjectProviderModel = serde_json::from_value(json!([1, 2])).unwrap();
    assert_eq!(model, ObjectProviderModel::Static(json!([1, 2])));
  }

  #[test]
  fn test_static_object_keeps_body_verbatim() {
    let model: ObjectProviderModel =
      serde_json::from_value(json!({"staticObject": {"anything": {"goes": true}}})).unwrap();
    assert_eq!(
      model,
      ObjectProviderModel::Static(json!({"anything": {"goes": true}}))
    );
  }

  #[test]
  fn test_adopts_providers_of_other_categories() {
    let model: ObjectProviderModel = serde_json::from_value(json!({
      "dynamicObject": [
        {"propertyName": "quoteNumber", "value": {"objectPathLookupText": "/context/quote/quoteNumber"}},
        {"propertyName": "count", "value": {"countListItems": [1, 2, 3]}}
      ]
    }))
    .unwrap();
    let ObjectProviderModel::Dynamic(properties) = model else {
      panic!("expected dynamic object");
    };
    assert!(matches!(properties[0].value, ObjectProviderModel::Text(_)));
    assert!(matches!(properties[1].value, ObjectProviderModel::Integer(_)));
  }

  #[test]
  fn test_patch_operations() {
    let model: ObjectProviderModel = serde_json::from_value(json!({
      "patchObject": {
        "source": {"staticObject": {"a": 1}},
        "operations": [
          {"add": {"path": "/b", "value": 2}},
          {"move": {"from": "/a", "path": "/c"}}
        ]
      }
    }))
    .unwrap();
    let ObjectProviderModel::Patch(patch) = model else {
      panic!("expected patch");
    };
    assert_eq!(patch.operations.len(), 2);
    assert!(matches!(patch.operations[1], PatchOperationModel::Move(_)));
  }

  #[test]
  fn test_adopts_expressions() {
    let model: ObjectProviderModel =
      serde_json::from_value(json!({"evaluateExpression": "context.quote.premium * 2"})).unwrap();
    assert!(matches!(model, ObjectProviderModel::Expression(_)));
  }

  #[test]
  fn test_unknown_key_is_rejected_after_fallback() {
    let result: Result<ObjectProviderModel, _> =
      serde_json::from_value(json!({"addFileToArchive": {}}));
    assert!(result.is_err());
  }
}
